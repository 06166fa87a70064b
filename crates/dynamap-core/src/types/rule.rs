//! Compiled conversion rules.
//!
//! A [`Rule`] is the per-type result of compilation: a tree that mirrors the
//! property's category and bottoms out in a bound [`TypeHandler`]. Walking it
//! never re-inspects type expressions or the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use dynamap_model::AttributeValue;

use super::category::ScalarKind;
use super::handler::{Leaf, TypeHandler, ValueError, expect_n, expect_s, json_kind};
use crate::codec::NestedCodec;

/// Conversion rule for one value position.
#[derive(Debug, Clone)]
pub enum Rule {
    /// A leaf bound to its handler.
    Leaf {
        /// The bound handler.
        handler: Arc<dyn TypeHandler>,
        /// Leaf metadata passed to the handler.
        leaf: Leaf,
    },
    /// A nullable container element; null is stored as `NULL`.
    Optional(Box<Rule>),
    /// An ordered list, stored as `L`.
    List(Box<Rule>),
    /// A set, stored as `SS` or `NS` (`L` when empty).
    Set {
        /// Element rule.
        element: Box<Rule>,
        /// `NS` rather than `SS`.
        numeric: bool,
    },
    /// A dictionary, stored as `M`.
    Map {
        /// Key validation.
        key: KeyRule,
        /// Value rule.
        value: Box<Rule>,
    },
    /// A nested object, stored as `M` through its own compiled fields.
    Object(NestedCodec),
}

impl Rule {
    /// Convert a model value to its wire form.
    pub fn encode(&self, value: &Value) -> Result<AttributeValue, ValueError> {
        if value.is_null() && !matches!(self, Self::Optional(_)) {
            return Err(ValueError::UnexpectedNull);
        }
        match self {
            Self::Leaf { handler, leaf } => handler.encode(value, leaf),
            Self::Optional(inner) => {
                if value.is_null() {
                    Ok(AttributeValue::Null(true))
                } else {
                    inner.encode(value)
                }
            }
            Self::List(element) => {
                let items = expect_array(value)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| element.encode(v).map_err(|e| e.at(format!("[{i}]"))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(AttributeValue::L)
            }
            Self::Set { element, numeric } => encode_set(element, *numeric, expect_array(value)?),
            Self::Map { key, value: rule } => {
                let Value::Object(entries) = value else {
                    return Err(ValueError::mismatch("map", json_kind(value)));
                };
                let mut out = BTreeMap::new();
                for (k, v) in entries {
                    key.check(k).map_err(|e| e.at(format!("[{k:?}]")))?;
                    let encoded = rule.encode(v).map_err(|e| e.at(format!("[{k:?}]")))?;
                    out.insert(k.clone(), encoded);
                }
                Ok(AttributeValue::M(out))
            }
            Self::Object(codec) => {
                let Value::Object(record) = value else {
                    return Err(ValueError::mismatch("object", json_kind(value)));
                };
                codec.with(|c| c.encode_object(record)).map(AttributeValue::M)
            }
        }
    }

    /// Convert a wire value back to the model's value.
    pub fn decode(&self, value: &AttributeValue) -> Result<Value, ValueError> {
        if value.is_null() && !matches!(self, Self::Optional(_)) {
            return Err(ValueError::UnexpectedNull);
        }
        match self {
            Self::Leaf { handler, leaf } => handler.decode(value, leaf),
            Self::Optional(inner) => {
                if value.is_null() {
                    Ok(Value::Null)
                } else {
                    inner.decode(value)
                }
            }
            Self::List(element) => {
                let items = value
                    .as_l()
                    .ok_or_else(|| ValueError::mismatch("L", value.type_descriptor()))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| element.decode(v).map_err(|e| e.at(format!("[{i}]"))))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Self::Set { element, numeric } => decode_set(element, *numeric, value),
            Self::Map { key, value: rule } => {
                let entries = value
                    .as_m()
                    .ok_or_else(|| ValueError::mismatch("M", value.type_descriptor()))?;
                let mut out = Map::new();
                for (k, v) in entries {
                    key.check(k).map_err(|e| e.at(format!("[{k:?}]")))?;
                    let decoded = rule.decode(v).map_err(|e| e.at(format!("[{k:?}]")))?;
                    out.insert(k.clone(), decoded);
                }
                Ok(Value::Object(out))
            }
            Self::Object(codec) => {
                let fields = value
                    .as_m()
                    .ok_or_else(|| ValueError::mismatch("M", value.type_descriptor()))?;
                codec.with(|c| c.decode_object(fields)).map(Value::Object)
            }
        }
    }
}

fn expect_array(value: &Value) -> Result<&[Value], ValueError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ValueError::mismatch("array", json_kind(value)))
}

fn encode_set(element: &Rule, numeric: bool, items: &[Value]) -> Result<AttributeValue, ValueError> {
    // The store rejects empty sets.
    if items.is_empty() {
        return Ok(AttributeValue::L(Vec::new()));
    }
    let mut out = Vec::with_capacity(items.len());
    for (i, v) in items.iter().enumerate() {
        let encoded = element.encode(v).map_err(|e| e.at(format!("[{i}]")))?;
        let text = if numeric {
            expect_n(&encoded)
        } else {
            expect_s(&encoded)
        }
        .map_err(|e| e.at(format!("[{i}]")))?;
        out.push(text.to_owned());
    }
    Ok(if numeric {
        AttributeValue::Ns(out)
    } else {
        AttributeValue::Ss(out)
    })
}

fn decode_set(element: &Rule, numeric: bool, value: &AttributeValue) -> Result<Value, ValueError> {
    let decoded = match value {
        AttributeValue::Ss(items) if !numeric => items
            .iter()
            .map(|s| element.decode(&AttributeValue::S(s.clone())))
            .collect::<Result<Vec<_>, _>>()?,
        AttributeValue::Ns(items) if numeric => items
            .iter()
            .map(|n| element.decode(&AttributeValue::N(n.clone())))
            .collect::<Result<Vec<_>, _>>()?,
        AttributeValue::L(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| element.decode(v).map_err(|e| e.at(format!("[{i}]"))))
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            let expected = if numeric { "NS" } else { "SS" };
            return Err(ValueError::mismatch(expected, other.type_descriptor()));
        }
    };
    Ok(Value::Array(decoded))
}

/// Validation of dictionary keys.
///
/// Keys are always strings in the serialized record (serde writes integer and
/// UUID map keys as text), so the rule only checks the text is well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRule {
    /// Any string.
    Text,
    /// A single character.
    Char,
    /// A UUID.
    Uuid,
    /// An integer within the kind's range.
    Integral(ScalarKind),
    /// An enum member name.
    Enum {
        /// Enum type name.
        name: String,
        /// Allowed member names.
        members: Arc<[String]>,
    },
}

impl KeyRule {
    /// Validate a key's text.
    pub fn check(&self, key: &str) -> Result<(), ValueError> {
        let invalid = |kind: &str| ValueError::InvalidFormat {
            kind: kind.to_owned(),
            value: key.to_owned(),
        };
        match self {
            Self::Text => Ok(()),
            Self::Char if key.chars().count() == 1 => Ok(()),
            Self::Char => Err(invalid("char")),
            Self::Uuid => uuid::Uuid::parse_str(key)
                .map(|_| ())
                .map_err(|_| invalid("Uuid")),
            Self::Integral(kind) => {
                let n: i128 = key
                    .parse()
                    .map_err(|_| ValueError::InvalidNumber(key.to_owned()))?;
                match kind.integral_range() {
                    Some((min, max)) if (min..=max).contains(&n) => Ok(()),
                    _ => Err(ValueError::OutOfRange {
                        value: key.to_owned(),
                        kind: kind.to_string(),
                    }),
                }
            }
            Self::Enum { name, members } => {
                if members.iter().any(|m| m == key) {
                    Ok(())
                } else {
                    Err(ValueError::UnknownEnumMember {
                        enum_name: name.clone(),
                        value: key.to_owned(),
                    })
                }
            }
        }
    }
}

impl fmt::Display for KeyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("String"),
            Self::Char => f.write_str("char"),
            Self::Uuid => f.write_str("Uuid"),
            Self::Integral(kind) => write!(f, "{kind}"),
            Self::Enum { name, .. } => f.write_str(name),
        }
    }
}

/// How a property is written.
#[derive(Debug, Clone)]
pub enum EncodeRule {
    /// Always written; null is an error.
    Direct(Arc<Rule>),
    /// Written only when the value is present.
    Conditional(Arc<Rule>),
}

impl EncodeRule {
    /// Encode a property value. `Ok(None)` means "omit the attribute".
    pub fn apply(&self, value: Option<&Value>) -> Result<Option<AttributeValue>, ValueError> {
        match (self, value) {
            (Self::Direct(rule), v) => rule.encode(v.unwrap_or(&Value::Null)).map(Some),
            (Self::Conditional(_), None | Some(Value::Null)) => Ok(None),
            (Self::Conditional(rule), Some(v)) => rule.encode(v).map(Some),
        }
    }
}

/// How a property is read.
#[derive(Debug, Clone)]
pub enum DecodeRule {
    /// The attribute must be present.
    Required(Arc<Rule>),
    /// An absent (or `NULL`) attribute reads as null.
    Optional(Arc<Rule>),
}

impl DecodeRule {
    /// Whether absence is an error.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required(_))
    }

    /// Decode a property value; `None` is an absent attribute.
    ///
    /// An absent required attribute yields `Ok(None)` so the caller can build
    /// an error that carries the property and record context.
    pub fn apply(&self, value: Option<&AttributeValue>) -> Result<Option<Value>, ValueError> {
        match (self, value) {
            (Self::Required(_), None) => Ok(None),
            (Self::Required(rule), Some(v)) => rule.decode(v).map(Some),
            (Self::Optional(_), None) => Ok(Some(Value::Null)),
            (Self::Optional(_), Some(v)) if v.is_null() => Ok(Some(Value::Null)),
            (Self::Optional(rule), Some(v)) => rule.decode(v).map(Some),
        }
    }
}
