//! Analyzed schema descriptors.
//!
//! Descriptors are the validated, inheritance-flattened form of
//! [`ModelDefinition`](super::definition::ModelDefinition)s. They are built
//! once per type by the [`SchemaAnalyzer`](super::analyzer::SchemaAnalyzer)
//! and then only read.

use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::schema::definition::{IgnoreMode, TimestampPrecision};
use crate::template::ResolvedTemplate;
use crate::types::Category;

/// One flattened property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Property name in the serialized model.
    pub name: String,
    /// Wire attribute name.
    pub attribute: String,
    /// Declared type expression.
    pub type_expr: String,
    /// Classified type.
    pub category: Category,
    /// Whether the type is `Option<_>`.
    pub nullable: bool,
    /// Ignore direction.
    pub ignore: IgnoreMode,
    /// Epoch timestamp precision.
    pub timestamp: Option<TimestampPrecision>,
    /// Type in the chain that declared (or last overrode) the property.
    pub declared_in: String,
}

impl PropertyDescriptor {
    /// Element category, for collections.
    #[must_use]
    pub fn element(&self) -> Option<&Category> {
        self.category.element()
    }

    /// Key and value categories, for dictionaries.
    #[must_use]
    pub fn dictionary(&self) -> Option<(&Category, &Category)> {
        self.category.dictionary()
    }
}

/// Primary key templates and attribute names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Partition key template.
    pub pk: ResolvedTemplate,
    /// Sort key template.
    pub sk: ResolvedTemplate,
    /// Partition key attribute.
    pub pk_attribute: String,
    /// Sort key attribute.
    pub sk_attribute: String,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Partition key template.
    pub pk: ResolvedTemplate,
    /// Sort key template, if the index has one.
    pub sk: Option<ResolvedTemplate>,
    /// Partition key attribute.
    pub pk_attribute: String,
    /// Sort key attribute.
    pub sk_attribute: String,
}

/// Discriminator written by a polymorphic variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorDescriptor {
    /// Attribute name.
    pub attribute: String,
    /// This variant's value.
    pub value: String,
}

/// Everything the codec needs to know about one concrete model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// Model type name.
    pub type_name: String,
    /// Ancestor names, root first, excluding the type itself.
    pub ancestors: Vec<String>,
    /// Primary key.
    pub primary_key: KeyDescriptor,
    /// Secondary indexes, at most five.
    pub indexes: Vec<IndexDescriptor>,
    /// Flattened properties, inherited ones first.
    pub properties: Vec<PropertyDescriptor>,
    /// Whether the type is an abstract root whose variants need discriminators.
    pub discriminator_required: bool,
    /// Discriminator, for variants of a polymorphic root.
    pub discriminator: Option<DiscriminatorDescriptor>,
    /// Non-blocking findings.
    pub warnings: Diagnostics,
}

impl SchemaDescriptor {
    /// Look up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// One concrete variant of a polymorphic root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    /// Discriminator value.
    pub value: String,
    /// The variant's schema.
    pub schema: Arc<SchemaDescriptor>,
}

/// An abstract root and its concrete variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicDescriptor {
    /// Root type name.
    pub root: String,
    /// Discriminator attribute name.
    pub attribute: String,
    /// Variants in catalog order.
    pub variants: Vec<VariantDescriptor>,
}

impl PolymorphicDescriptor {
    /// The variant stored under `value`.
    #[must_use]
    pub fn variant(&self, value: &str) -> Option<&VariantDescriptor> {
        self.variants.iter().find(|v| v.value == value)
    }
}
