//! Structured schema findings.
//!
//! Schema analysis never stops at the first problem: every finding is pushed
//! into a [`Diagnostics`] collector so all problems in a model surface together.

use std::fmt;

use serde::Serialize;
use tracing::warn;

/// Well-known diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum DiagnosticCode {
    /// More secondary indexes than the storage engine allows.
    TooManySecondaryIndexes,
    /// No primary key, or an empty PK/SK template.
    MissingKeyTemplate,
    /// A key template could not be tokenized.
    InvalidTemplate,
    /// A placeholder names a property the model does not have.
    PropertyNotFound,
    /// A timestamp precision marker on a non-datetime property.
    InvalidTimestampMarker,
    /// A concrete variant of a polymorphic root has no discriminator value.
    MissingDiscriminator,
    /// Two variants share a discriminator value.
    DuplicateDiscriminator,
    /// A referenced type (parent, root) is not in the catalog.
    UnknownType,
    /// A property type has no encode/decode rule.
    UnsupportedType,
    /// Two attributes map to the same wire name.
    DuplicateAttribute,
    /// Two secondary indexes share a name.
    DuplicateIndexName,
    /// A key placeholder names a property whose value cannot be stringified.
    NonScalarKeyProperty,
    /// A primary-key placeholder names a nullable property.
    NullableKeyProperty,
    /// An abstract root with no concrete variants.
    EmptyHierarchy,
}

impl DiagnosticCode {
    /// Returns the stable identifier (e.g. `"DM0001"`).
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::TooManySecondaryIndexes => "DM0001",
            Self::MissingKeyTemplate => "DM0002",
            Self::InvalidTemplate => "DM0003",
            Self::PropertyNotFound => "DM0004",
            Self::InvalidTimestampMarker => "DM0005",
            Self::MissingDiscriminator => "DM0006",
            Self::DuplicateDiscriminator => "DM0007",
            Self::UnknownType => "DM0008",
            Self::UnsupportedType => "DM0009",
            Self::DuplicateAttribute => "DM0010",
            Self::DuplicateIndexName => "DM0011",
            Self::NonScalarKeyProperty => "DM0012",
            Self::NullableKeyProperty => "DM0013",
            Self::EmptyHierarchy => "DM0014",
        }
    }

    /// Returns the short code name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooManySecondaryIndexes => "TooManySecondaryIndexes",
            Self::MissingKeyTemplate => "MissingKeyTemplate",
            Self::InvalidTemplate => "InvalidTemplate",
            Self::PropertyNotFound => "PropertyNotFound",
            Self::InvalidTimestampMarker => "InvalidTimestampMarker",
            Self::MissingDiscriminator => "MissingDiscriminator",
            Self::DuplicateDiscriminator => "DuplicateDiscriminator",
            Self::UnknownType => "UnknownType",
            Self::UnsupportedType => "UnsupportedType",
            Self::DuplicateAttribute => "DuplicateAttribute",
            Self::DuplicateIndexName => "DuplicateIndexName",
            Self::NonScalarKeyProperty => "NonScalarKeyProperty",
            Self::NullableKeyProperty => "NullableKeyProperty",
            Self::EmptyHierarchy => "EmptyHierarchy",
        }
    }

    /// Default severity of findings with this code.
    #[must_use]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::NullableKeyProperty | Self::EmptyHierarchy => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported, does not block codec construction by default.
    Warning,
    /// Blocks codec construction.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A single schema finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// The finding's code.
    pub code: DiagnosticCode,
    /// Severity, derived from the code.
    pub severity: Severity,
    /// Human-readable explanation.
    pub message: String,
    /// Model type the finding is about.
    pub subject_type: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {}",
            self.severity,
            self.code.id(),
            self.subject_type,
            self.message
        )
    }
}

/// Collector of findings for one or more model types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding.
    pub fn report(
        &mut self,
        code: DiagnosticCode,
        subject_type: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            code,
            severity: code.default_severity(),
            message: message.into(),
            subject_type: subject_type.into(),
        };
        warn!(
            code = diagnostic.code.id(),
            subject = %diagnostic.subject_type,
            "{}",
            diagnostic.message
        );
        self.items.push(diagnostic);
    }

    /// Move every finding of `other` into this collector.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Whether any finding blocks codec construction.
    #[must_use]
    pub fn is_blocking(&self, warnings_as_errors: bool) -> bool {
        self.items
            .iter()
            .any(|d| d.severity == Severity::Error || warnings_as_errors)
    }

    /// Whether any error-severity finding exists.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.is_blocking(false)
    }

    /// Findings with the given code.
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    /// All findings, in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no findings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}
