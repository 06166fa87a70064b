//! Leaf type handlers.
//!
//! A [`TypeHandler`] is a (predicate, encode, decode) triple for one family of
//! leaf categories. Handlers only ever see leaves (scalars, enums,
//! timestamps); containers and optionals are walked by the compiled
//! [`Rule`](super::rule::Rule) tree and re-dispatch to handlers per element.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use dynamap_model::AttributeValue;

use super::category::{Category, ScalarKind, TimestampKind};
use crate::schema::definition::TimestampPrecision;

/// Per-value conversion failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The value has the wrong shape for its declared type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// What the rule expects.
        expected: &'static str,
        /// What it got.
        found: String,
    },
    /// Number text that cannot be parsed.
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    /// A number outside the declared type's range.
    #[error("number '{value}' is out of range for {kind}")]
    OutOfRange {
        /// The number text.
        value: String,
        /// The declared type.
        kind: String,
    },
    /// Text that does not parse as the declared type.
    #[error("invalid {kind} value '{value}'")]
    InvalidFormat {
        /// The declared type.
        kind: String,
        /// The offending text.
        value: String,
    },
    /// An enum name not among the declared members.
    #[error("'{value}' is not a member of enum {enum_name}")]
    UnknownEnumMember {
        /// Enum type name.
        enum_name: String,
        /// The stored name.
        value: String,
    },
    /// A null where the declared type is not optional.
    #[error("null value for a non-nullable type")]
    UnexpectedNull,
    /// A required field of a nested object is absent.
    #[error("missing field '{0}'")]
    MissingField(String),
    /// A nested object codec whose owning item codec has been dropped.
    #[error("codec for nested type '{0}' is no longer available")]
    DetachedNested(String),
    /// A failure inside a container element or nested field.
    #[error("at {path}: {source}")]
    InPath {
        /// Dotted/indexed path to the failing element.
        path: String,
        /// The underlying failure.
        source: Box<ValueError>,
    },
}

impl ValueError {
    /// Prefix the failure with a path segment (`[3]`, `.name`, `["key"]`).
    #[must_use]
    pub fn at(self, segment: impl fmt::Display) -> Self {
        match self {
            Self::InPath { path, source } => Self::InPath {
                path: format!("{segment}{path}"),
                source,
            },
            other => Self::InPath {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.into(),
        }
    }
}

/// Short name of a JSON value's shape, for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Everything a handler knows about the leaf it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    /// Leaf category (scalar, enum, or timestamp).
    pub category: Category,
    /// Timestamp precision marker, if any.
    pub precision: Option<TimestampPrecision>,
    /// Enum member names, for enum leaves.
    pub enum_members: Option<Arc<[String]>>,
}

impl Leaf {
    /// A leaf with no markers.
    #[must_use]
    pub fn new(category: Category) -> Self {
        Self {
            category,
            precision: None,
            enum_members: None,
        }
    }
}

/// One pluggable encode/decode rule pair.
pub trait TypeHandler: fmt::Debug + Send + Sync {
    /// Handler name, for logs.
    fn name(&self) -> &'static str;

    /// Whether this handler owns the leaf.
    fn handles(&self, leaf: &Leaf) -> bool;

    /// Convert a model value to its wire form.
    fn encode(&self, value: &Value, leaf: &Leaf) -> Result<AttributeValue, ValueError>;

    /// Convert a wire value back to the model's value.
    fn decode(&self, value: &AttributeValue, leaf: &Leaf) -> Result<Value, ValueError>;
}

// ---------------------------------------------------------------------------
// Epoch timestamps
// ---------------------------------------------------------------------------

/// Date-times carrying a precision marker, stored as whole seconds or
/// milliseconds since the Unix epoch (UTC).
#[derive(Debug, Default, Clone, Copy)]
pub struct EpochTimestampHandler;

impl TypeHandler for EpochTimestampHandler {
    fn name(&self) -> &'static str {
        "epoch-timestamp"
    }

    fn handles(&self, leaf: &Leaf) -> bool {
        leaf.precision.is_some() && matches!(leaf.category, Category::Timestamp(_))
    }

    fn encode(&self, value: &Value, leaf: &Leaf) -> Result<AttributeValue, ValueError> {
        let (Category::Timestamp(kind), Some(precision)) = (&leaf.category, leaf.precision) else {
            return Err(ValueError::mismatch("timestamp", leaf.category.to_string()));
        };
        let utc = parse_timestamp(value, *kind)?;
        let epoch = match precision {
            TimestampPrecision::Seconds => utc.timestamp(),
            TimestampPrecision::Milliseconds => utc.timestamp_millis(),
        };
        Ok(AttributeValue::number(epoch))
    }

    fn decode(&self, value: &AttributeValue, leaf: &Leaf) -> Result<Value, ValueError> {
        let (Category::Timestamp(kind), Some(precision)) = (&leaf.category, leaf.precision) else {
            return Err(ValueError::mismatch("timestamp", leaf.category.to_string()));
        };
        let text = expect_n(value)?;
        let epoch: i64 = text
            .parse()
            .map_err(|_| ValueError::InvalidNumber(text.to_owned()))?;
        let utc = match precision {
            TimestampPrecision::Seconds => DateTime::<Utc>::from_timestamp(epoch, 0),
            TimestampPrecision::Milliseconds => DateTime::<Utc>::from_timestamp_millis(epoch),
        }
        .ok_or_else(|| ValueError::OutOfRange {
            value: text.to_owned(),
            kind: kind.to_string(),
        })?;
        let out = match kind {
            TimestampKind::DateTimeUtc => serde_json::to_value(utc),
            TimestampKind::NaiveDateTime => serde_json::to_value(utc.naive_utc()),
        };
        out.map_err(|_| ValueError::OutOfRange {
            value: text.to_owned(),
            kind: kind.to_string(),
        })
    }
}

/// Read a serialized date-time the same way the model's own deserializer will.
fn parse_timestamp(value: &Value, kind: TimestampKind) -> Result<DateTime<Utc>, ValueError> {
    let invalid = || ValueError::InvalidFormat {
        kind: kind.to_string(),
        value: value.to_string(),
    };
    match kind {
        TimestampKind::DateTimeUtc => {
            serde_json::from_value::<DateTime<Utc>>(value.clone()).map_err(|_| invalid())
        }
        TimestampKind::NaiveDateTime => serde_json::from_value::<NaiveDateTime>(value.clone())
            .map(|naive| naive.and_utc())
            .map_err(|_| invalid()),
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Unit-variant enums stored by member name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumHandler;

impl EnumHandler {
    fn check<'v>(leaf: &Leaf, name: &'v str) -> Result<&'v str, ValueError> {
        let known = leaf
            .enum_members
            .as_ref()
            .is_some_and(|members| members.iter().any(|m| m == name));
        if known {
            Ok(name)
        } else {
            Err(ValueError::UnknownEnumMember {
                enum_name: leaf.category.to_string(),
                value: name.to_owned(),
            })
        }
    }
}

impl TypeHandler for EnumHandler {
    fn name(&self) -> &'static str {
        "enum"
    }

    fn handles(&self, leaf: &Leaf) -> bool {
        matches!(leaf.category, Category::Enum(_))
    }

    fn encode(&self, value: &Value, leaf: &Leaf) -> Result<AttributeValue, ValueError> {
        let Value::String(name) = value else {
            return Err(ValueError::mismatch("enum member name", json_kind(value)));
        };
        Ok(AttributeValue::S(Self::check(leaf, name)?.to_owned()))
    }

    fn decode(&self, value: &AttributeValue, leaf: &Leaf) -> Result<Value, ValueError> {
        let name = expect_s(value)?;
        Ok(Value::String(Self::check(leaf, name)?.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Catch-all for built-in scalars and unmarked timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimitiveHandler;

impl TypeHandler for PrimitiveHandler {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn handles(&self, leaf: &Leaf) -> bool {
        match &leaf.category {
            Category::Scalar(ScalarKind::Custom(_)) => false,
            Category::Scalar(_) => true,
            Category::Timestamp(_) => leaf.precision.is_none(),
            _ => false,
        }
    }

    fn encode(&self, value: &Value, leaf: &Leaf) -> Result<AttributeValue, ValueError> {
        match &leaf.category {
            Category::Scalar(kind) => encode_scalar(value, kind),
            Category::Timestamp(kind) => {
                parse_timestamp(value, *kind)?;
                Ok(AttributeValue::S(expect_json_str(value)?.to_owned()))
            }
            other => Err(ValueError::mismatch("primitive", other.to_string())),
        }
    }

    fn decode(&self, value: &AttributeValue, leaf: &Leaf) -> Result<Value, ValueError> {
        match &leaf.category {
            Category::Scalar(kind) => decode_scalar(value, kind),
            Category::Timestamp(kind) => {
                let out = Value::String(expect_s(value)?.to_owned());
                parse_timestamp(&out, *kind)?;
                Ok(out)
            }
            other => Err(ValueError::mismatch("primitive", other.to_string())),
        }
    }
}

fn encode_scalar(value: &Value, kind: &ScalarKind) -> Result<AttributeValue, ValueError> {
    match kind {
        ScalarKind::Bool => value
            .as_bool()
            .map(AttributeValue::Bool)
            .ok_or_else(|| ValueError::mismatch("boolean", json_kind(value))),
        ScalarKind::String => Ok(AttributeValue::S(expect_json_str(value)?.to_owned())),
        ScalarKind::Char => {
            let s = expect_json_str(value)?;
            check_char(s)?;
            Ok(AttributeValue::S(s.to_owned()))
        }
        ScalarKind::Uuid => {
            let s = expect_json_str(value)?;
            uuid::Uuid::parse_str(s).map_err(|_| invalid_format(kind, s))?;
            Ok(AttributeValue::S(s.to_owned()))
        }
        ScalarKind::Date => {
            let s = expect_json_str(value)?;
            s.parse::<NaiveDate>().map_err(|_| invalid_format(kind, s))?;
            Ok(AttributeValue::S(s.to_owned()))
        }
        ScalarKind::Decimal => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => return Err(ValueError::mismatch("decimal", json_kind(other))),
            };
            check_decimal(&text)?;
            Ok(AttributeValue::N(text))
        }
        ScalarKind::Duration => encode_duration(value),
        ScalarKind::Bytes => {
            let Value::Array(items) = value else {
                return Err(ValueError::mismatch("byte array", json_kind(value)));
            };
            let bytes = items
                .iter()
                .map(|b| {
                    b.as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| ValueError::mismatch("byte", b.to_string()))
                })
                .collect::<Result<Vec<u8>, _>>()?;
            Ok(AttributeValue::B(bytes::Bytes::from(bytes)))
        }
        k if k.is_integral() || k.is_float() => {
            let Value::Number(n) = value else {
                return Err(ValueError::mismatch("number", json_kind(value)));
            };
            if k.is_integral() && !(n.is_i64() || n.is_u64()) {
                return Err(ValueError::mismatch("integer", n.to_string()));
            }
            Ok(AttributeValue::N(n.to_string()))
        }
        other => Err(ValueError::mismatch("built-in scalar", other.to_string())),
    }
}

fn decode_scalar(value: &AttributeValue, kind: &ScalarKind) -> Result<Value, ValueError> {
    match kind {
        ScalarKind::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| ValueError::mismatch("BOOL", value.type_descriptor())),
        ScalarKind::String => Ok(Value::String(expect_s(value)?.to_owned())),
        ScalarKind::Char => {
            let s = expect_s(value)?;
            check_char(s)?;
            Ok(Value::String(s.to_owned()))
        }
        ScalarKind::Uuid => {
            let s = expect_s(value)?;
            uuid::Uuid::parse_str(s).map_err(|_| invalid_format(kind, s))?;
            Ok(Value::String(s.to_owned()))
        }
        ScalarKind::Date => {
            let s = expect_s(value)?;
            s.parse::<NaiveDate>().map_err(|_| invalid_format(kind, s))?;
            Ok(Value::String(s.to_owned()))
        }
        ScalarKind::Decimal => {
            let text = expect_n(value)?;
            check_decimal(text)?;
            Ok(Value::String(text.to_owned()))
        }
        ScalarKind::Duration => decode_duration(expect_n(value)?),
        ScalarKind::Bytes => {
            let bytes = value
                .as_b()
                .ok_or_else(|| ValueError::mismatch("B", value.type_descriptor()))?;
            Ok(Value::Array(
                bytes.iter().map(|b| Value::Number(Number::from(*b))).collect(),
            ))
        }
        k if k.is_integral() => decode_integral(expect_n(value)?, k),
        k if k.is_float() => {
            let text = expect_n(value)?;
            let f: f64 = text
                .parse()
                .map_err(|_| ValueError::InvalidNumber(text.to_owned()))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ValueError::InvalidNumber(text.to_owned()))
        }
        other => Err(ValueError::mismatch("built-in scalar", other.to_string())),
    }
}

fn decode_integral(text: &str, kind: &ScalarKind) -> Result<Value, ValueError> {
    let n: i128 = text
        .parse()
        .map_err(|_| ValueError::InvalidNumber(text.to_owned()))?;
    let out_of_range = || ValueError::OutOfRange {
        value: text.to_owned(),
        kind: kind.to_string(),
    };
    let (min, max) = kind.integral_range().ok_or_else(out_of_range)?;
    if n < min || n > max {
        return Err(out_of_range());
    }
    let number = if kind.is_unsigned() {
        u64::try_from(n).map(Number::from).map_err(|_| out_of_range())?
    } else {
        i64::try_from(n).map(Number::from).map_err(|_| out_of_range())?
    };
    Ok(Value::Number(number))
}

/// `std::time::Duration` serializes as `{"secs": u64, "nanos": u32}`; on the
/// wire it is decimal seconds with at most nine fractional digits.
fn encode_duration(value: &Value) -> Result<AttributeValue, ValueError> {
    let secs = value.get("secs").and_then(Value::as_u64);
    let nanos = value.get("nanos").and_then(Value::as_u64);
    let (Some(secs), Some(nanos)) = (secs, nanos) else {
        return Err(ValueError::mismatch("duration", json_kind(value)));
    };
    if nanos == 0 {
        return Ok(AttributeValue::number(secs));
    }
    let frac = format!("{nanos:09}");
    Ok(AttributeValue::N(format!(
        "{secs}.{}",
        frac.trim_end_matches('0')
    )))
}

fn decode_duration(text: &str) -> Result<Value, ValueError> {
    let invalid = || ValueError::InvalidNumber(text.to_owned());
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let secs: u64 = whole.parse().map_err(|_| invalid())?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().map_err(|_| invalid())?
    };
    Ok(serde_json::json!({ "secs": secs, "nanos": nanos }))
}

fn check_decimal(text: &str) -> Result<(), ValueError> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let valid = !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
        && !(digits.contains('.') && frac.is_empty());
    if valid {
        Ok(())
    } else {
        Err(ValueError::InvalidNumber(text.to_owned()))
    }
}

fn check_char(s: &str) -> Result<(), ValueError> {
    if s.chars().count() == 1 {
        Ok(())
    } else {
        Err(invalid_format(&ScalarKind::Char, s))
    }
}

fn invalid_format(kind: &ScalarKind, value: &str) -> ValueError {
    ValueError::InvalidFormat {
        kind: kind.to_string(),
        value: value.to_owned(),
    }
}

fn expect_json_str(value: &Value) -> Result<&str, ValueError> {
    value
        .as_str()
        .ok_or_else(|| ValueError::mismatch("string", json_kind(value)))
}

pub(crate) fn expect_s(value: &AttributeValue) -> Result<&str, ValueError> {
    value
        .as_s()
        .ok_or_else(|| ValueError::mismatch("S", value.type_descriptor()))
}

pub(crate) fn expect_n(value: &AttributeValue) -> Result<&str, ValueError> {
    value
        .as_n()
        .ok_or_else(|| ValueError::mismatch("N", value.type_descriptor()))
}
