//! Single-table polymorphism over a closed Rust enum.
//!
//! Each [`Variant`] pairs one concrete model type with a wrap function into
//! the enum and a projection back out of it. The codec holds a compiled
//! [`ItemCodec`] per variant, keyed by discriminator value, so decoding reads
//! the discriminator once and dispatches without walking any hierarchy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use dynamap_model::{AttributeValue, Item, KeyContext};

use super::ItemCodec;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{DecodeError, EncodeError, SchemaError};
use crate::mapper::Entity;
use crate::schema::definition::TypeCatalog;
use crate::schema::descriptor::PolymorphicDescriptor;
use crate::types::{HandlerRegistry, ValueError};

type ToRecord<P> = dyn Fn(&P) -> Option<Result<Value, serde_json::Error>> + Send + Sync;
type FromRecord<P> = dyn Fn(Value) -> Result<P, serde_json::Error> + Send + Sync;

/// One concrete variant of a polymorphic enum `P`.
pub struct Variant<P> {
    type_name: &'static str,
    describe: fn(&mut TypeCatalog),
    to_record: Box<ToRecord<P>>,
    from_record: Box<FromRecord<P>>,
}

impl<P: 'static> Variant<P> {
    /// Variant backed by model type `T`.
    ///
    /// `wrap` builds the enum from a decoded `T`; `project` returns the `T`
    /// inside an enum value, or `None` for other variants.
    #[must_use]
    pub fn of<T: Entity>(wrap: fn(T) -> P, project: fn(&P) -> Option<&T>) -> Self {
        Self {
            type_name: T::TYPE_NAME,
            describe: T::describe,
            to_record: Box::new(move |p| project(p).map(serde_json::to_value)),
            from_record: Box::new(move |v| serde_json::from_value::<T>(v).map(wrap)),
        }
    }

    /// The variant's model type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Register the variant's types.
    pub fn describe(&self, catalog: &mut TypeCatalog) {
        (self.describe)(catalog);
    }
}

impl<P> fmt::Debug for Variant<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Entry<P> {
    value: String,
    codec: ItemCodec,
    variant: Variant<P>,
}

/// Encoder/decoder for every variant of a polymorphic root.
#[derive(Debug)]
pub struct VariantRegistry<P> {
    root: String,
    attribute: String,
    entries: Vec<Entry<P>>,
    by_value: BTreeMap<String, usize>,
}

impl<P: 'static> VariantRegistry<P> {
    /// Compile one codec per variant.
    ///
    /// Every variant must be a concrete descendant listed in `descriptor`.
    pub fn build(
        descriptor: &PolymorphicDescriptor,
        variants: Vec<Variant<P>>,
        catalog: &TypeCatalog,
        registry: &HandlerRegistry,
    ) -> Result<Self, SchemaError> {
        let mut diags = Diagnostics::new();
        let mut entries = Vec::with_capacity(variants.len());
        for variant in variants {
            let Some(found) = descriptor
                .variants
                .iter()
                .find(|v| v.schema.type_name == variant.type_name)
            else {
                diags.report(
                    DiagnosticCode::UnknownType,
                    &descriptor.root,
                    format!(
                        "'{}' is not a concrete variant of '{}'",
                        variant.type_name, descriptor.root
                    ),
                );
                continue;
            };
            match ItemCodec::build(Arc::clone(&found.schema), catalog, registry) {
                Ok(codec) => entries.push(Entry {
                    value: found.value.clone(),
                    codec,
                    variant,
                }),
                Err(err) => diags.extend(err.diagnostics),
            }
        }
        if diags.has_errors() {
            return Err(SchemaError::new(&descriptor.root, diags));
        }

        let by_value = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.value.clone(), i))
            .collect();
        Ok(Self {
            root: descriptor.root.clone(),
            attribute: descriptor.attribute.clone(),
            entries,
            by_value,
        })
    }

    /// Root type name.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Discriminator attribute name.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Registered discriminator values.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.value.as_str())
    }

    /// Codec of the variant stored under `value`.
    #[must_use]
    pub fn variant_codec(&self, value: &str) -> Option<&ItemCodec> {
        self.by_value.get(value).map(|&i| &self.entries[i].codec)
    }

    /// Encode with the first variant that projects `value`.
    pub fn encode(&self, value: &P) -> Result<Item, EncodeError> {
        for entry in &self.entries {
            if let Some(record) = (entry.variant.to_record)(value) {
                let record = record.map_err(|source| EncodeError::Serialize {
                    type_name: entry.variant.type_name.to_owned(),
                    source,
                })?;
                return entry.codec.encode(&record);
            }
        }
        Err(EncodeError::UnregisteredVariant {
            root: self.root.clone(),
        })
    }

    /// Decode by discriminator.
    pub fn decode(&self, item: &Item, key: &KeyContext) -> Result<P, DecodeError> {
        let entry = self.entry_for(item, key)?;
        let record = entry.codec.decode(item, key)?;
        (entry.variant.from_record)(record).map_err(|source| DecodeError::Deserialize {
            type_name: entry.variant.type_name.to_owned(),
            key: key.clone(),
            source,
        })
    }

    /// Decode, deriving the key context from the item.
    pub fn decode_item(&self, item: &Item) -> Result<P, DecodeError> {
        let key = self.key_context(item);
        self.decode(item, &key)
    }

    /// The `(pk, sk)` pair of an item.
    ///
    /// Key attribute names come from the variant named by the item's
    /// discriminator, or from the first variant when it names none.
    #[must_use]
    pub fn key_context(&self, item: &Item) -> KeyContext {
        item.get(&self.attribute)
            .and_then(AttributeValue::as_s)
            .and_then(|value| self.by_value.get(value))
            .map(|&i| &self.entries[i])
            .or_else(|| self.entries.first())
            .map(|e| e.codec.key_context(item))
            .unwrap_or_default()
    }

    fn entry_for(&self, item: &Item, key: &KeyContext) -> Result<&Entry<P>, DecodeError> {
        let stored = item
            .get(&self.attribute)
            .ok_or_else(|| DecodeError::MissingDiscriminator {
                attribute: self.attribute.clone(),
                key: key.clone(),
            })?;
        let value = match stored {
            AttributeValue::S(s) => s.as_str(),
            other => {
                return Err(DecodeError::InvalidAttribute {
                    attribute: self.attribute.clone(),
                    key: key.clone(),
                    source: ValueError::TypeMismatch {
                        expected: "S",
                        found: other.type_descriptor().to_owned(),
                    },
                });
            }
        };
        self.by_value
            .get(value)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| DecodeError::UnknownVariant {
                attribute: self.attribute.clone(),
                value: value.to_owned(),
                key: key.clone(),
            })
    }
}
