//! Property type categories.

use std::fmt;

/// Leaf scalar kinds understood by the built-in handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `String`
    String,
    /// `char`
    Char,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// Arbitrary-precision decimal carried as text.
    Decimal,
    /// `Uuid`
    Uuid,
    /// `std::time::Duration`
    Duration,
    /// `NaiveDate`
    Date,
    /// `bytes::Bytes`
    Bytes,
    /// A scalar registered in the catalog and served by a user handler.
    Custom(String),
}

impl ScalarKind {
    /// Map a primitive type name to its kind.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => Self::Bool,
            "String" | "str" => Self::String,
            "char" => Self::Char,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "isize" => Self::Isize,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "usize" => Self::Usize,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "Decimal" | "BigDecimal" => Self::Decimal,
            "Uuid" => Self::Uuid,
            "Duration" => Self::Duration,
            "NaiveDate" => Self::Date,
            "Bytes" => Self::Bytes,
            _ => return None,
        };
        Some(kind)
    }

    /// Signed or unsigned integer.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::I16
                | Self::I32
                | Self::I64
                | Self::Isize
                | Self::U8
                | Self::U16
                | Self::U32
                | Self::U64
                | Self::Usize
        )
    }

    /// Unsigned integer.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::Usize
        )
    }

    /// `f32` or `f64`.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Encoded as an `N` value by the built-in handlers.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_float() || matches!(self, Self::Decimal | Self::Duration)
    }

    /// Encoded as an `S` value by the built-in handlers.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Char | Self::Uuid | Self::Date)
    }

    /// Inclusive integer range, for range-checking decoded numbers.
    #[must_use]
    pub fn integral_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Self::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            Self::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            Self::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            Self::I64 | Self::Isize => (i128::from(i64::MIN), i128::from(i64::MAX)),
            Self::U8 => (0, i128::from(u8::MAX)),
            Self::U16 => (0, i128::from(u16::MAX)),
            Self::U32 => (0, i128::from(u32::MAX)),
            Self::U64 | Self::Usize => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(range)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::String => f.write_str("String"),
            Self::Char => f.write_str("char"),
            Self::I8 => f.write_str("i8"),
            Self::I16 => f.write_str("i16"),
            Self::I32 => f.write_str("i32"),
            Self::I64 => f.write_str("i64"),
            Self::Isize => f.write_str("isize"),
            Self::U8 => f.write_str("u8"),
            Self::U16 => f.write_str("u16"),
            Self::U32 => f.write_str("u32"),
            Self::U64 => f.write_str("u64"),
            Self::Usize => f.write_str("usize"),
            Self::F32 => f.write_str("f32"),
            Self::F64 => f.write_str("f64"),
            Self::Decimal => f.write_str("Decimal"),
            Self::Uuid => f.write_str("Uuid"),
            Self::Duration => f.write_str("Duration"),
            Self::Date => f.write_str("NaiveDate"),
            Self::Bytes => f.write_str("Bytes"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Date-time types that accept a timestamp precision marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampKind {
    /// `DateTime<Utc>`
    DateTimeUtc,
    /// `NaiveDateTime`, interpreted as UTC.
    NaiveDateTime,
}

impl fmt::Display for TimestampKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateTimeUtc => f.write_str("DateTime<Utc>"),
            Self::NaiveDateTime => f.write_str("NaiveDateTime"),
        }
    }
}

/// Shape of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered sequence, stored as `L`.
    List,
    /// Unique elements, stored as `SS` or `NS`.
    Set,
}

/// Classification of a declared property type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    /// A primitive value.
    Scalar(ScalarKind),
    /// An optional value; absent values are omitted, not null-marked.
    Nullable(Box<Category>),
    /// A unit-variant enum stored by member name.
    Enum(String),
    /// A date-time value.
    Timestamp(TimestampKind),
    /// A list or set.
    Collection {
        /// List or set.
        kind: CollectionKind,
        /// Element category.
        element: Box<Category>,
    },
    /// A string-keyed map.
    Dictionary {
        /// Key category.
        key: Box<Category>,
        /// Value category.
        value: Box<Category>,
    },
    /// A nested object described in the catalog.
    Nested(String),
}

impl Category {
    /// Whether this is an optional value.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable(_))
    }

    /// The category with one level of `Nullable` removed.
    #[must_use]
    pub fn non_null(&self) -> &Category {
        match self {
            Self::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Scalar, enum, or timestamp: a value served directly by a handler.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_) | Self::Timestamp(_))
    }

    /// Element category of a collection.
    #[must_use]
    pub fn element(&self) -> Option<&Category> {
        match self.non_null() {
            Self::Collection { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Key and value categories of a dictionary.
    #[must_use]
    pub fn dictionary(&self) -> Option<(&Category, &Category)> {
        match self.non_null() {
            Self::Dictionary { key, value } => Some((key, value)),
            _ => None,
        }
    }

    /// Whether the (non-null) category is a timestamp.
    #[must_use]
    pub fn is_timestamp(&self) -> bool {
        matches!(self.non_null(), Self::Timestamp(_))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Nullable(inner) => write!(f, "Option<{inner}>"),
            Self::Enum(name) | Self::Nested(name) => f.write_str(name),
            Self::Timestamp(kind) => write!(f, "{kind}"),
            Self::Collection {
                kind: CollectionKind::List,
                element,
            } => write!(f, "Vec<{element}>"),
            Self::Collection {
                kind: CollectionKind::Set,
                element,
            } => write!(f, "Set<{element}>"),
            Self::Dictionary { key, value } => write!(f, "Map<{key}, {value}>"),
        }
    }
}
