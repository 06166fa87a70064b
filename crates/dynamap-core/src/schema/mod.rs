//! Schema input, analysis, and the resulting descriptors.

pub mod analyzer;
pub mod definition;
pub mod descriptor;

pub use analyzer::SchemaAnalyzer;
pub use definition::{
    EnumDefinition, IgnoreMode, IndexDefinition, KeyDefinition, ModelDefinition,
    PropertyDefinition, TimestampPrecision, TypeCatalog,
};
pub use descriptor::{
    DiscriminatorDescriptor, IndexDescriptor, KeyDescriptor, PolymorphicDescriptor,
    PropertyDescriptor, SchemaDescriptor, VariantDescriptor,
};
