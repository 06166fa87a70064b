//! Declarative schema input.
//!
//! These are plain data types: they can be built in code from an
//! `Entity::describe` hook or deserialized from a JSON catalog file. Nothing
//! here depends on how a model type is reflected.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Precision of an epoch-encoded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimestampPrecision {
    /// Whole seconds since the Unix epoch.
    Seconds,
    /// Whole milliseconds since the Unix epoch.
    Milliseconds,
}

/// Which directions skip a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreMode {
    /// The property is written and read.
    #[default]
    Never,
    /// The property is read but never written.
    OnEncode,
    /// The property is written but never read.
    OnDecode,
    /// The property is neither written nor read.
    Always,
}

impl IgnoreMode {
    /// Whether encode skips the property.
    #[must_use]
    pub fn skips_encode(self) -> bool {
        matches!(self, Self::OnEncode | Self::Always)
    }

    /// Whether decode skips the property.
    #[must_use]
    pub fn skips_decode(self) -> bool {
        matches!(self, Self::OnDecode | Self::Always)
    }
}

/// One property of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    /// Property name as the model serializes it.
    pub name: String,
    /// Declared type expression, e.g. `"Option<Vec<String>>"`.
    #[serde(rename = "type")]
    pub type_expr: String,
    /// Wire attribute name, when it differs from the property name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Ignore direction.
    #[serde(default)]
    pub ignore: IgnoreMode,
    /// Epoch encoding for date-time properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampPrecision>,
}

impl PropertyDefinition {
    /// Create a property with no markers.
    #[must_use]
    pub fn new(name: impl Into<String>, type_expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_expr: type_expr.into(),
            rename: None,
            ignore: IgnoreMode::Never,
            timestamp: None,
        }
    }

    /// Store under a different attribute name.
    #[must_use]
    pub fn with_rename(mut self, attribute: impl Into<String>) -> Self {
        self.rename = Some(attribute.into());
        self
    }

    /// Skip the property in the given direction(s).
    #[must_use]
    pub fn with_ignore(mut self, mode: IgnoreMode) -> Self {
        self.ignore = mode;
        self
    }

    /// Store a date-time as an epoch number.
    #[must_use]
    pub fn with_timestamp(mut self, precision: TimestampPrecision) -> Self {
        self.timestamp = Some(precision);
        self
    }
}

/// Primary key templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDefinition {
    /// Partition key template.
    pub pk: String,
    /// Sort key template.
    pub sk: String,
    /// Partition key attribute override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk_attribute: Option<String>,
    /// Sort key attribute override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sk_attribute: Option<String>,
}

impl KeyDefinition {
    /// Key templates stored under the configured attribute names.
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
            pk_attribute: None,
            sk_attribute: None,
        }
    }

    /// Override both attribute names.
    #[must_use]
    pub fn with_attributes(mut self, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        self.pk_attribute = Some(pk.into());
        self.sk_attribute = Some(sk.into());
        self
    }
}

/// Secondary index templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    /// Index name, e.g. `"GSI1"`.
    pub name: String,
    /// Partition key template.
    pub pk: String,
    /// Sort key template, for indexes with a range key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sk: Option<String>,
    /// Partition key attribute override (default `<name>PK`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk_attribute: Option<String>,
    /// Sort key attribute override (default `<name>SK`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sk_attribute: Option<String>,
}

impl IndexDefinition {
    /// A hash-only index.
    #[must_use]
    pub fn new(name: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pk: pk.into(),
            sk: None,
            pk_attribute: None,
            sk_attribute: None,
        }
    }

    /// Add a sort key template.
    #[must_use]
    pub fn with_sort(mut self, sk: impl Into<String>) -> Self {
        self.sk = Some(sk.into());
        self
    }

    /// Override both attribute names.
    #[must_use]
    pub fn with_attributes(mut self, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        self.pk_attribute = Some(pk.into());
        self.sk_attribute = Some(sk.into());
        self
    }
}

/// A model (or nested object) type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    /// Type name, unique in the catalog.
    pub name: String,
    /// Parent type whose properties, key and indexes are inherited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Polymorphic root: concrete descendants must declare a discriminator.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Discriminator value of a concrete variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<String>,
    /// Discriminator attribute override, on roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator_attribute: Option<String>,
    /// Primary key templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyDefinition>,
    /// Secondary index templates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexDefinition>,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ModelDefinition {
    /// An empty model definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_abstract: false,
            discriminator: None,
            discriminator_attribute: None,
            key: None,
            indexes: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Inherit from `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Mark as a polymorphic root.
    #[must_use]
    pub fn with_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Declare this variant's discriminator value.
    #[must_use]
    pub fn with_discriminator(mut self, value: impl Into<String>) -> Self {
        self.discriminator = Some(value.into());
        self
    }

    /// Override the discriminator attribute name (roots only).
    #[must_use]
    pub fn with_discriminator_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.discriminator_attribute = Some(attribute.into());
        self
    }

    /// Declare primary key templates under the default attribute names.
    #[must_use]
    pub fn with_key(mut self, pk: impl Into<String>, sk: impl Into<String>) -> Self {
        self.key = Some(KeyDefinition::new(pk, sk));
        self
    }

    /// Declare a fully specified primary key.
    #[must_use]
    pub fn with_key_definition(mut self, key: KeyDefinition) -> Self {
        self.key = Some(key);
        self
    }

    /// Add a secondary index.
    #[must_use]
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Add a property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }
}

/// A unit-variant enum stored by member name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    /// Enum type name.
    pub name: String,
    /// Member names as they appear on the wire.
    pub members: Vec<String>,
}

impl EnumDefinition {
    /// Define an enum.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// Why an ancestor chain could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AncestryError {
    /// The type itself or one of its parents is not in the catalog.
    #[error("type '{name}' is not defined in the catalog")]
    Unknown {
        /// The missing type.
        name: String,
    },
    /// The parent chain loops back on itself.
    #[error("inheritance cycle through '{name}'")]
    Cycle {
        /// A type on the cycle.
        name: String,
    },
}

/// Every type a set of models refers to.
///
/// Registration replaces an existing entry of the same name, so `describe`
/// hooks can safely register shared dependencies more than once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CatalogDocument", into = "CatalogDocument")]
pub struct TypeCatalog {
    models: BTreeMap<String, ModelDefinition>,
    enums: BTreeMap<String, EnumDefinition>,
    scalars: BTreeSet<String>,
}

/// On-disk layout of a catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    models: Vec<ModelDefinition>,
    #[serde(default)]
    enums: Vec<EnumDefinition>,
    #[serde(default)]
    scalars: Vec<String>,
}

impl From<CatalogDocument> for TypeCatalog {
    fn from(doc: CatalogDocument) -> Self {
        let mut catalog = Self::new();
        for model in doc.models {
            catalog.register(model);
        }
        for def in doc.enums {
            catalog.register_enum(def);
        }
        for scalar in doc.scalars {
            catalog.register_scalar(scalar);
        }
        catalog
    }
}

impl From<TypeCatalog> for CatalogDocument {
    fn from(catalog: TypeCatalog) -> Self {
        Self {
            models: catalog.models.into_values().collect(),
            enums: catalog.enums.into_values().collect(),
            scalars: catalog.scalars.into_iter().collect(),
        }
    }
}

impl TypeCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model or nested object type.
    pub fn register(&mut self, model: ModelDefinition) {
        self.models.insert(model.name.clone(), model);
    }

    /// Register an enum.
    pub fn register_enum(&mut self, def: EnumDefinition) {
        self.enums.insert(def.name.clone(), def);
    }

    /// Register a custom scalar type name, served by a user handler.
    pub fn register_scalar(&mut self, name: impl Into<String>) {
        self.scalars.insert(name.into());
    }

    /// Look up a model.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    /// Look up an enum.
    #[must_use]
    pub fn enum_def(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name)
    }

    /// Whether `name` is a registered custom scalar.
    #[must_use]
    pub fn is_scalar(&self, name: &str) -> bool {
        self.scalars.contains(name)
    }

    /// All models, in name order.
    pub fn models(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Ancestor chain of `name`, root first and `name` last.
    pub fn ancestry(&self, name: &str) -> Result<Vec<&ModelDefinition>, AncestryError> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(name);
        while let Some(n) = current {
            if !seen.insert(n) {
                return Err(AncestryError::Cycle { name: n.to_owned() });
            }
            let model = self
                .models
                .get(n)
                .ok_or_else(|| AncestryError::Unknown { name: n.to_owned() })?;
            chain.push(model);
            current = model.parent.as_deref();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Concrete (non-abstract) types whose ancestor chain includes `root`.
    pub fn concrete_descendants<'a>(
        &'a self,
        root: &'a str,
    ) -> impl Iterator<Item = &'a ModelDefinition> + 'a {
        self.models.values().filter(move |m| {
            !m.is_abstract
                && m.name != root
                && self
                    .ancestry(&m.name)
                    .is_ok_and(|chain| chain.iter().any(|a| a.name == root))
        })
    }
}
