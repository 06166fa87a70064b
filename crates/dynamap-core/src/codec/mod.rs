//! Item codecs.
//!
//! An [`ItemCodec`] is compiled once from a [`SchemaDescriptor`]: every
//! property gets its encode/decode rule pair, and nested object types get
//! their own [`ObjectCodec`]. Encoding renders key templates, sparse index
//! attributes, properties and the discriminator, in that order. Decoding
//! reads properties only; key attributes are write-only composites.

pub mod polymorphic;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use dynamap_model::{AttributeValue, Item, KeyContext};

use crate::config::CodecConfig;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{DecodeError, EncodeError, SchemaError};
use crate::schema::definition::{IgnoreMode, TypeCatalog};
use crate::schema::descriptor::{DiscriminatorDescriptor, PropertyDescriptor, SchemaDescriptor};
use crate::schema::SchemaAnalyzer;
use crate::template::{ResolvedTemplate, Segment};
use crate::types::{
    ClassifyError, CompileContext, DecodeRule, EncodeRule, HandlerRegistry, Rule, ValueError,
};

pub use polymorphic::{Variant, VariantRegistry};

/// Compiled rules for one property.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    /// Property name in the serialized model.
    pub property: String,
    /// Wire attribute name.
    pub attribute: String,
    /// Ignore direction.
    pub ignore: IgnoreMode,
    /// Write rule.
    pub encode: EncodeRule,
    /// Read rule.
    pub decode: DecodeRule,
}

/// Compiled field rules of an object type, used for nested objects and as
/// the property section of an [`ItemCodec`].
#[derive(Debug, Clone)]
pub struct ObjectCodec {
    type_name: String,
    fields: Vec<FieldCodec>,
}

impl ObjectCodec {
    /// Compile one field per property, in property order.
    ///
    /// Every failing property is returned, not just the first.
    pub fn compile(
        type_name: &str,
        properties: &[PropertyDescriptor],
        registry: &HandlerRegistry,
        ctx: &mut dyn CompileContext,
    ) -> Result<Self, Vec<(String, ClassifyError)>> {
        let mut fields = Vec::with_capacity(properties.len());
        let mut failures = Vec::new();
        for property in properties {
            match registry.rules_for(property, ctx) {
                Ok(rules) => fields.push(FieldCodec {
                    property: property.name.clone(),
                    attribute: property.attribute.clone(),
                    ignore: property.ignore,
                    encode: rules.encode,
                    decode: rules.decode,
                }),
                Err(err) => failures.push((property.name.clone(), err)),
            }
        }
        if failures.is_empty() {
            Ok(Self {
                type_name: type_name.to_owned(),
                fields,
            })
        } else {
            Err(failures)
        }
    }

    /// Object type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Compiled fields, in property order.
    #[must_use]
    pub fn fields(&self) -> &[FieldCodec] {
        &self.fields
    }

    /// Encode a nested object's fields.
    pub fn encode_object(
        &self,
        record: &Map<String, Value>,
    ) -> Result<BTreeMap<String, AttributeValue>, ValueError> {
        let mut out = BTreeMap::new();
        for field in &self.fields {
            if field.ignore.skips_encode() {
                continue;
            }
            let encoded = field
                .encode
                .apply(record.get(&field.property))
                .map_err(|e| e.at(format!(".{}", field.property)))?;
            if let Some(value) = encoded {
                out.insert(field.attribute.clone(), value);
            }
        }
        Ok(out)
    }

    /// Decode a nested object's fields.
    pub fn decode_object(
        &self,
        attributes: &BTreeMap<String, AttributeValue>,
    ) -> Result<Map<String, Value>, ValueError> {
        let mut out = Map::new();
        for field in &self.fields {
            if field.ignore.skips_decode() {
                continue;
            }
            match field.decode.apply(attributes.get(&field.attribute)) {
                Ok(Some(value)) => {
                    out.insert(field.property.clone(), value);
                }
                Ok(None) => return Err(ValueError::MissingField(field.attribute.clone())),
                Err(e) => return Err(e.at(format!(".{}", field.property))),
            }
        }
        Ok(out)
    }
}

type CodecSlot = OnceLock<ObjectCodec>;

/// Handle to a nested object's compiled fields.
///
/// The slot exists before the type's fields are compiled, so a
/// self-referential field links to the same codec as its parent. Links back
/// into a type that is still being compiled are weak; the first occurrence
/// owns the slot.
#[derive(Debug, Clone)]
pub struct NestedCodec {
    type_name: String,
    link: Link,
}

#[derive(Debug, Clone)]
enum Link {
    Owned(Arc<CodecSlot>),
    Back(Weak<CodecSlot>),
}

impl NestedCodec {
    /// Nested type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Run `f` with the compiled codec.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&ObjectCodec) -> Result<R, ValueError>,
    ) -> Result<R, ValueError> {
        let slot = match &self.link {
            Link::Owned(slot) => Arc::clone(slot),
            Link::Back(weak) => weak
                .upgrade()
                .ok_or_else(|| ValueError::DetachedNested(self.type_name.clone()))?,
        };
        let codec = slot
            .get()
            .ok_or_else(|| ValueError::DetachedNested(self.type_name.clone()))?;
        f(codec)
    }
}

/// Compiles nested object types on demand, once each.
///
/// A type is cached with an empty slot before its fields are compiled. Reaching
/// it again while the slot is still empty means the type refers to itself.
#[derive(Debug)]
struct Compiler<'a> {
    catalog: &'a TypeCatalog,
    config: CodecConfig,
    cache: HashMap<String, Arc<CodecSlot>>,
}

impl<'a> Compiler<'a> {
    fn new(catalog: &'a TypeCatalog) -> Self {
        Self {
            catalog,
            config: CodecConfig::default(),
            cache: HashMap::new(),
        }
    }
}

impl CompileContext for Compiler<'_> {
    fn enum_members(&self, name: &str) -> Option<Arc<[String]>> {
        self.catalog
            .enum_def(name)
            .map(|def| Arc::from(def.members.as_slice()))
    }

    fn nested(&mut self, name: &str, registry: &HandlerRegistry) -> Result<Rule, ClassifyError> {
        if let Some(slot) = self.cache.get(name) {
            let link = if slot.get().is_some() {
                Link::Owned(Arc::clone(slot))
            } else {
                debug!(type_name = name, "self-referential nested type; linking to its own codec");
                Link::Back(Arc::downgrade(slot))
            };
            return Ok(Rule::Object(NestedCodec {
                type_name: name.to_owned(),
                link,
            }));
        }

        let properties = SchemaAnalyzer::new(self.catalog, &self.config)
            .properties_of(name)
            .map_err(|err| ClassifyError::Unsupported {
                ty: name.to_owned(),
                reason: err.to_string(),
            })?;

        let slot = Arc::new(CodecSlot::new());
        self.cache.insert(name.to_owned(), Arc::clone(&slot));
        let codec = match ObjectCodec::compile(name, &properties, registry, self) {
            Ok(codec) => codec,
            Err(failures) => {
                self.cache.remove(name);
                let reason = failures
                    .iter()
                    .map(|(property, err)| format!("{property}: {err}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ClassifyError::Unsupported {
                    ty: name.to_owned(),
                    reason,
                });
            }
        };
        // Only this call fills the slot, so it is still empty here.
        let _ = slot.set(codec);
        Ok(Rule::Object(NestedCodec {
            type_name: name.to_owned(),
            link: Link::Owned(slot),
        }))
    }
}

/// Compiled encoder/decoder for one concrete model type.
#[derive(Debug, Clone)]
pub struct ItemCodec {
    descriptor: Arc<SchemaDescriptor>,
    object: ObjectCodec,
}

impl ItemCodec {
    /// Compile a codec for `descriptor`.
    ///
    /// Fails for abstract roots and for any property whose type has no rule.
    pub fn build(
        descriptor: Arc<SchemaDescriptor>,
        catalog: &TypeCatalog,
        registry: &HandlerRegistry,
    ) -> Result<Self, SchemaError> {
        let type_name = descriptor.type_name.as_str();
        let mut diags = Diagnostics::new();
        if descriptor.discriminator_required {
            diags.report(
                DiagnosticCode::UnsupportedType,
                type_name,
                format!("'{type_name}' is an abstract root; encode its concrete variants instead"),
            );
            return Err(SchemaError::new(type_name, diags));
        }

        let mut compiler = Compiler::new(catalog);
        let object = ObjectCodec::compile(type_name, &descriptor.properties, registry, &mut compiler)
            .map_err(|failures| {
                for (property, err) in failures {
                    let code = match err {
                        ClassifyError::UnknownType { .. } => DiagnosticCode::UnknownType,
                        _ => DiagnosticCode::UnsupportedType,
                    };
                    diags.report(code, type_name, format!("property '{property}': {err}"));
                }
                SchemaError::new(type_name, diags)
            })?;

        debug!(
            type_name,
            fields = object.fields.len(),
            indexes = descriptor.indexes.len(),
            nested = compiler.cache.len(),
            "compiled item codec"
        );
        Ok(Self { descriptor, object })
    }

    /// The analyzed schema.
    #[must_use]
    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    /// Compiled property fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldCodec] {
        self.object.fields()
    }

    /// Discriminator written by this codec, for polymorphic variants.
    #[must_use]
    pub fn discriminator(&self) -> Option<&DiscriminatorDescriptor> {
        self.descriptor.discriminator.as_ref()
    }

    /// The `(pk, sk)` pair of an item written by this codec.
    #[must_use]
    pub fn key_context(&self, item: &Item) -> KeyContext {
        let key = &self.descriptor.primary_key;
        KeyContext::from_item(item, &key.pk_attribute, &key.sk_attribute)
    }

    /// Encode a serialized model record.
    pub fn encode(&self, record: &Value) -> Result<Item, EncodeError> {
        let type_name = self.descriptor.type_name.as_str();
        let Value::Object(record) = record else {
            return Err(EncodeError::NotAnObject {
                type_name: type_name.to_owned(),
            });
        };
        let mut item = Item::new();

        let key = &self.descriptor.primary_key;
        for (attribute, template) in [(&key.pk_attribute, &key.pk), (&key.sk_attribute, &key.sk)] {
            match self.render(template, record)? {
                Ok(text) => {
                    item.insert(attribute.clone(), AttributeValue::S(text));
                }
                Err(property) => {
                    return Err(EncodeError::MissingKeyValue {
                        type_name: type_name.to_owned(),
                        attribute: attribute.clone(),
                        property,
                    });
                }
            }
        }

        for index in &self.descriptor.indexes {
            let pk = self.render(&index.pk, record)?;
            let sk = index
                .sk
                .as_ref()
                .map(|sk| self.render(sk, record))
                .transpose()?;
            match (pk, sk) {
                (Ok(pk), None) => {
                    item.insert(index.pk_attribute.clone(), AttributeValue::S(pk));
                }
                (Ok(pk), Some(Ok(sk))) => {
                    item.insert(index.pk_attribute.clone(), AttributeValue::S(pk));
                    item.insert(index.sk_attribute.clone(), AttributeValue::S(sk));
                }
                (Err(property), _) | (_, Some(Err(property))) => {
                    trace!(
                        type_name,
                        index = %index.name,
                        property = %property,
                        "omitting sparse index attributes"
                    );
                }
            }
        }

        for field in &self.object.fields {
            if field.ignore.skips_encode() {
                continue;
            }
            let encoded = field
                .encode
                .apply(record.get(&field.property))
                .map_err(|source| EncodeError::InvalidValue {
                    type_name: type_name.to_owned(),
                    property: field.property.clone(),
                    source,
                })?;
            if let Some(value) = encoded {
                item.insert(field.attribute.clone(), value);
            }
        }

        if let Some(d) = &self.descriptor.discriminator {
            item.insert(d.attribute.clone(), AttributeValue::S(d.value.clone()));
        }
        Ok(item)
    }

    /// Decode an item into a model record.
    pub fn decode(&self, item: &Item, key: &KeyContext) -> Result<Value, DecodeError> {
        if let Some(d) = &self.descriptor.discriminator {
            if let Some(found) = item.get(&d.attribute).and_then(AttributeValue::as_s) {
                if found != d.value {
                    return Err(DecodeError::VariantMismatch {
                        expected: d.value.clone(),
                        found: found.to_owned(),
                        key: key.clone(),
                    });
                }
            }
        }

        let mut out = Map::new();
        for field in &self.object.fields {
            if field.ignore.skips_decode() {
                continue;
            }
            match field.decode.apply(item.get(&field.attribute)) {
                Ok(Some(value)) => {
                    out.insert(field.property.clone(), value);
                }
                Ok(None) => {
                    return Err(DecodeError::MissingAttribute {
                        property: field.property.clone(),
                        attribute: field.attribute.clone(),
                        key: key.clone(),
                    });
                }
                Err(source) => {
                    return Err(DecodeError::InvalidAttribute {
                        attribute: field.attribute.clone(),
                        key: key.clone(),
                        source,
                    });
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Serialize and encode a model.
    pub fn encode_model<T: Serialize>(&self, model: &T) -> Result<Item, EncodeError> {
        let record = serde_json::to_value(model).map_err(|source| EncodeError::Serialize {
            type_name: self.descriptor.type_name.clone(),
            source,
        })?;
        self.encode(&record)
    }

    /// Decode and deserialize a model.
    pub fn decode_model<T: DeserializeOwned>(
        &self,
        item: &Item,
        key: &KeyContext,
    ) -> Result<T, DecodeError> {
        let record = self.decode(item, key)?;
        serde_json::from_value(record).map_err(|source| DecodeError::Deserialize {
            type_name: self.descriptor.type_name.clone(),
            key: key.clone(),
            source,
        })
    }

    /// Render a template. The inner `Err` names the first absent property.
    fn render(
        &self,
        template: &ResolvedTemplate,
        record: &Map<String, Value>,
    ) -> Result<Result<String, String>, EncodeError> {
        let mut absent = None;
        let rendered = template.render(|index| {
            let field = &self.object.fields[index];
            let text = self.key_text(field, record.get(&field.property))?;
            if text.is_none() {
                absent = Some(field.property.clone());
            }
            Ok(text)
        })?;
        Ok(rendered.ok_or_else(|| {
            absent.unwrap_or_else(|| first_property(template).unwrap_or_default())
        }))
    }

    /// Key text of one property value, through the property's own rule so
    /// enums and epoch timestamps render as they are stored.
    fn key_text(&self, field: &FieldCodec, value: Option<&Value>) -> Result<Option<String>, EncodeError> {
        let invalid = |source| EncodeError::InvalidValue {
            type_name: self.descriptor.type_name.clone(),
            property: field.property.clone(),
            source,
        };
        let rule = match &field.encode {
            EncodeRule::Direct(rule) | EncodeRule::Conditional(rule) => rule,
        };
        let value = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(v) => v,
        };
        match rule.encode(value).map_err(invalid)? {
            AttributeValue::S(s) | AttributeValue::N(s) => Ok(Some(s)),
            AttributeValue::Bool(b) => Ok(Some(b.to_string())),
            other => Err(invalid(ValueError::TypeMismatch {
                expected: "key text",
                found: other.type_descriptor().to_owned(),
            })),
        }
    }
}

fn first_property(template: &ResolvedTemplate) -> Option<String> {
    template.segments().iter().find_map(|s| match s {
        Segment::Property { name, .. } => Some(name.clone()),
        Segment::Literal(_) => None,
    })
}
