//! Dynamap lint - validate a type catalog.
//!
//! Loads a JSON type catalog, analyzes every model in it, and prints one line
//! per diagnostic. The exit status is non-zero when any finding blocks codec
//! construction.
//!
//! # Usage
//!
//! ```text
//! dynamap-lint catalog.json
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DYNAMAP_PK_ATTRIBUTE` | `PK` | Default partition key attribute |
//! | `DYNAMAP_SK_ATTRIBUTE` | `SK` | Default sort key attribute |
//! | `DYNAMAP_DISCRIMINATOR_ATTRIBUTE` | `Type` | Default discriminator attribute |
//! | `DYNAMAP_WARNINGS_AS_ERRORS` | `false` | Fail on warnings too |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dynamap_core::config::CodecConfig;
use dynamap_core::diagnostics::{Diagnostics, Severity};
use dynamap_core::schema::{SchemaAnalyzer, TypeCatalog};

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `LOG_LEVEL`. Logs go to
/// stderr so stdout carries only the report.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

fn parse_catalog(text: &str) -> Result<TypeCatalog> {
    serde_json::from_str(text).context("catalog is not a valid type catalog document")
}

fn load_catalog(path: &Path) -> Result<TypeCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read catalog {}", path.display()))?;
    parse_catalog(&text).with_context(|| format!("failed to load {}", path.display()))
}

fn lint(catalog: &TypeCatalog, config: &CodecConfig) -> Diagnostics {
    SchemaAnalyzer::new(catalog, config).analyze_all()
}

fn main() -> Result<ExitCode> {
    init_tracing(&log_level())?;

    let path = std::env::args_os()
        .nth(1)
        .context("usage: dynamap-lint <catalog.json>")?;
    let catalog = load_catalog(Path::new(&path))?;
    let config = CodecConfig::from_env();
    info!(models = catalog.models().count(), "linting catalog");

    let diags = lint(&catalog, &config);
    for d in diags.iter() {
        println!("{d}");
    }
    let errors = diags
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    println!("{errors} error(s), {} warning(s)", diags.len() - errors);

    Ok(if diags.is_blocking(config.warnings_as_errors) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
