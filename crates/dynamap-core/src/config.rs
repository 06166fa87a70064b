//! Codec configuration.
//!
//! Provides [`CodecConfig`], the knobs shared by every codec a [`Mapper`]
//! builds. Values can be loaded from environment variables via
//! [`CodecConfig::from_env`].
//!
//! [`Mapper`]: crate::mapper::Mapper

use std::env;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Maximum number of secondary indexes a model may declare.
///
/// This is a storage-engine limit, not a tunable.
pub const MAX_SECONDARY_INDEXES: usize = 5;

/// Codec configuration.
///
/// # Examples
///
/// ```
/// use dynamap_core::config::CodecConfig;
///
/// let config = CodecConfig::builder().discriminator_attribute("Kind".to_owned()).build();
/// assert_eq!(config.pk_attribute, "PK");
/// assert_eq!(config.discriminator_attribute, "Kind");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase", default)]
pub struct CodecConfig {
    /// Partition key attribute name used when a model does not override it.
    #[builder(default = String::from("PK"))]
    pub pk_attribute: String,

    /// Sort key attribute name used when a model does not override it.
    #[builder(default = String::from("SK"))]
    pub sk_attribute: String,

    /// Attribute holding the variant discriminator of polymorphic models.
    #[builder(default = String::from("Type"))]
    pub discriminator_attribute: String,

    /// Treat warning diagnostics as blocking.
    #[builder(default = false)]
    pub warnings_as_errors: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            pk_attribute: String::from("PK"),
            sk_attribute: String::from("SK"),
            discriminator_attribute: String::from("Type"),
            warnings_as_errors: false,
        }
    }
}

impl CodecConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Field |
    /// | --- | --- |
    /// | `DYNAMAP_PK_ATTRIBUTE` | `pk_attribute` |
    /// | `DYNAMAP_SK_ATTRIBUTE` | `sk_attribute` |
    /// | `DYNAMAP_DISCRIMINATOR_ATTRIBUTE` | `discriminator_attribute` |
    /// | `DYNAMAP_WARNINGS_AS_ERRORS` | `warnings_as_errors` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("DYNAMAP_PK_ATTRIBUTE") {
            config.pk_attribute = v;
        }
        if let Ok(v) = env::var("DYNAMAP_SK_ATTRIBUTE") {
            config.sk_attribute = v;
        }
        if let Ok(v) = env::var("DYNAMAP_DISCRIMINATOR_ATTRIBUTE") {
            config.discriminator_attribute = v;
        }
        config.warnings_as_errors = env_bool("DYNAMAP_WARNINGS_AS_ERRORS", false);

        config
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| {
        matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES")
    })
}
