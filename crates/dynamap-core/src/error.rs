//! Error types for schema building, encoding and decoding.

use std::fmt;

use dynamap_model::KeyContext;

use crate::diagnostics::Diagnostics;
use crate::types::ValueError;

/// A model schema is invalid; carries every finding.
#[derive(Debug, Clone, thiserror::Error)]
pub struct SchemaError {
    /// The type whose schema was being built.
    pub type_name: String,
    /// Every finding, including any warnings.
    pub diagnostics: Diagnostics,
}

impl SchemaError {
    /// Wrap collected diagnostics.
    #[must_use]
    pub fn new(type_name: impl Into<String>, diagnostics: Diagnostics) -> Self {
        Self {
            type_name: type_name.into(),
            diagnostics,
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "schema for '{}' is invalid ({} finding(s))",
            self.type_name,
            self.diagnostics.len()
        )?;
        for d in self.diagnostics.iter() {
            write!(f, "\n  {d}")?;
        }
        Ok(())
    }
}

/// Failure to turn a model into an item.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The model could not be serialized.
    #[error("failed to serialize '{type_name}': {source}")]
    Serialize {
        /// Model type.
        type_name: String,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
    /// The model did not serialize to a JSON object.
    #[error("'{type_name}' did not serialize to an object")]
    NotAnObject {
        /// Model type.
        type_name: String,
    },
    /// A primary-key placeholder has no value.
    #[error("primary key attribute '{attribute}' of '{type_name}' needs '{property}', which is absent")]
    MissingKeyValue {
        /// Model type.
        type_name: String,
        /// Key attribute being rendered.
        attribute: String,
        /// The absent property.
        property: String,
    },
    /// A property value could not be converted.
    #[error("property '{property}' of '{type_name}': {source}")]
    InvalidValue {
        /// Model type.
        type_name: String,
        /// Property name.
        property: String,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },
    /// No registered variant accepts the value.
    #[error("no variant of '{root}' is registered for this value")]
    UnregisteredVariant {
        /// Polymorphic root.
        root: String,
    },
}

/// Failure to turn an item back into a model.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// A required attribute is absent.
    #[error("missing attribute '{attribute}' for property '{property}' ({key})")]
    MissingAttribute {
        /// Property name.
        property: String,
        /// Expected attribute name.
        attribute: String,
        /// Record key.
        key: KeyContext,
    },
    /// The discriminator names no registered variant.
    #[error("unknown {attribute} '{value}' ({key})")]
    UnknownVariant {
        /// Discriminator attribute.
        attribute: String,
        /// Stored value.
        value: String,
        /// Record key.
        key: KeyContext,
    },
    /// A polymorphic item has no discriminator.
    #[error("missing discriminator attribute '{attribute}' ({key})")]
    MissingDiscriminator {
        /// Discriminator attribute.
        attribute: String,
        /// Record key.
        key: KeyContext,
    },
    /// The item belongs to a different variant than the one requested.
    #[error("item is a '{found}' but '{expected}' was requested ({key})")]
    VariantMismatch {
        /// Requested variant's discriminator value.
        expected: String,
        /// Stored discriminator value.
        found: String,
        /// Record key.
        key: KeyContext,
    },
    /// An attribute could not be converted.
    #[error("attribute '{attribute}' ({key}): {source}")]
    InvalidAttribute {
        /// Attribute name.
        attribute: String,
        /// Record key.
        key: KeyContext,
        /// Conversion failure.
        #[source]
        source: ValueError,
    },
    /// The decoded record does not deserialize into the model.
    #[error("failed to deserialize '{type_name}' ({key}): {source}")]
    Deserialize {
        /// Model type.
        type_name: String,
        /// Record key.
        key: KeyContext,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Key of the record that failed.
    #[must_use]
    pub fn key(&self) -> &KeyContext {
        match self {
            Self::MissingAttribute { key, .. }
            | Self::UnknownVariant { key, .. }
            | Self::MissingDiscriminator { key, .. }
            | Self::VariantMismatch { key, .. }
            | Self::InvalidAttribute { key, .. }
            | Self::Deserialize { key, .. } => key,
        }
    }
}

/// Any codec failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Invalid schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Encode failure.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Decode failure.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;

    #[test]
    fn test_should_list_findings_in_schema_error() {
        let mut diags = Diagnostics::new();
        diags.report(DiagnosticCode::MissingKeyTemplate, "Order", "no key");
        let err = SchemaError::new("Order", diags);
        let text = err.to_string();
        assert!(text.starts_with("schema for 'Order' is invalid (1 finding(s))"));
        assert!(text.contains("DM0002"));
    }

    #[test]
    fn test_should_format_missing_attribute_with_key() {
        let err = DecodeError::MissingAttribute {
            property: "Total".to_owned(),
            attribute: "total".to_owned(),
            key: KeyContext::new("ORDER#1", "METADATA"),
        };
        assert_eq!(
            err.to_string(),
            "missing attribute 'total' for property 'Total' (PK=ORDER#1, SK=METADATA)"
        );
        assert_eq!(err.key().pk.as_deref(), Some("ORDER#1"));
    }

    #[test]
    fn test_should_convert_into_codec_error() {
        let err: CodecError = EncodeError::NotAnObject {
            type_name: "X".to_owned(),
        }
        .into();
        assert!(matches!(err, CodecError::Encode(_)));
    }
}
