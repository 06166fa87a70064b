//! End-to-end tests for the Dynamap codec engine.
//!
//! Every test goes through the public [`Mapper`] surface with real serde
//! models, the way an application would.
//!
//! Run them with:
//! ```text
//! cargo test -p dynamap-integration
//! ```

use std::sync::Once;

use dynamap_core::Mapper;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A mapper with the default configuration and handlers.
#[must_use]
pub fn mapper() -> Mapper {
    init_tracing();
    Mapper::default()
}

mod test_diagnostics;
mod test_polymorphic;
mod test_roundtrip;
