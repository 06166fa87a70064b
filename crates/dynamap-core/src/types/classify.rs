//! Type expression parsing and classification.
//!
//! Property types are declared as Rust type expressions (`"Option<Vec<i64>>"`,
//! `"chrono::DateTime<chrono::Utc>"`). The parser reduces each path to its last
//! segment and keeps generic arguments; the classifier then maps the tree to a
//! [`Category`], recursing through containers until it reaches a leaf.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::category::{Category, CollectionKind, ScalarKind, TimestampKind};
use crate::schema::definition::TypeCatalog;

/// Errors produced while parsing or classifying a type expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The expression is not a well-formed path with generic arguments.
    #[error("cannot parse type '{expr}': {message}")]
    Syntax {
        /// The expression.
        expr: String,
        /// Explanation.
        message: String,
    },
    /// A type name that is neither built in nor in the catalog.
    #[error("unknown type '{name}'")]
    UnknownType {
        /// The unresolved name.
        name: String,
    },
    /// A known type used with the wrong number of generic arguments.
    #[error("type '{name}' expects {expected} generic argument(s), found {found}")]
    Arity {
        /// The type name.
        name: String,
        /// Expected argument count.
        expected: usize,
        /// Actual argument count.
        found: usize,
    },
    /// A well-formed type the codec has no rule for.
    #[error("unsupported type '{ty}': {reason}")]
    Unsupported {
        /// The offending type, as classified so far.
        ty: String,
        /// Explanation.
        reason: String,
    },
}

/// A parsed type expression: last path segment plus generic arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    /// Last path segment, e.g. `DateTime` for `chrono::DateTime<Utc>`.
    pub name: String,
    /// Generic arguments.
    pub args: Vec<TypeExpr>,
}

impl TypeExpr {
    /// Parse a type expression.
    pub fn parse(input: &str) -> Result<Self, ClassifyError> {
        let mut parser = TypeParser {
            input,
            chars: input.chars().peekable(),
        };
        let expr = parser.parse_type()?;
        parser.skip_whitespace();
        if let Some(&c) = parser.chars.peek() {
            return Err(parser.error(format!("unexpected '{c}' after type")));
        }
        Ok(expr)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

struct TypeParser<'a> {
    input: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl TypeParser<'_> {
    fn error(&self, message: impl Into<String>) -> ClassifyError {
        ClassifyError::Syntax {
            expr: self.input.to_owned(),
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    /// `path ('<' type (',' type)* '>')?`
    fn parse_type(&mut self) -> Result<TypeExpr, ClassifyError> {
        self.skip_whitespace();
        let mut name = self.read_ident();
        if name.is_empty() {
            return Err(self.error("expected a type name"));
        }
        // Keep only the last segment of `a::b::Name`.
        while self.chars.peek() == Some(&':') {
            self.chars.next();
            if self.chars.next() != Some(':') {
                return Err(self.error("expected '::'"));
            }
            name = self.read_ident();
            if name.is_empty() {
                return Err(self.error("expected a path segment after '::'"));
            }
        }

        self.skip_whitespace();
        let mut args = Vec::new();
        if self.chars.peek() == Some(&'<') {
            self.chars.next();
            loop {
                args.push(self.parse_type()?);
                self.skip_whitespace();
                match self.chars.next() {
                    Some(',') => {}
                    Some('>') => break,
                    Some(c) => return Err(self.error(format!("unexpected '{c}' in arguments"))),
                    None => return Err(self.error("unterminated generic arguments")),
                }
            }
        }
        Ok(TypeExpr { name, args })
    }
}

/// Maps type expressions to categories using the built-in vocabulary plus the
/// enums, custom scalars, and nested objects of a catalog.
#[derive(Debug, Clone, Copy)]
pub struct TypeClassifier<'a> {
    catalog: &'a TypeCatalog,
}

impl<'a> TypeClassifier<'a> {
    /// Classifier backed by `catalog`.
    #[must_use]
    pub fn new(catalog: &'a TypeCatalog) -> Self {
        Self { catalog }
    }

    /// Parse and classify a declared type.
    pub fn classify_str(&self, type_expr: &str) -> Result<Category, ClassifyError> {
        self.classify(&TypeExpr::parse(type_expr)?)
    }

    /// Classify a parsed type.
    pub fn classify(&self, expr: &TypeExpr) -> Result<Category, ClassifyError> {
        let name = expr.name.as_str();
        match name {
            "Option" => {
                let inner = self.classify(single_arg(expr)?)?;
                if inner.is_nullable() {
                    return Err(ClassifyError::Unsupported {
                        ty: expr.to_string(),
                        reason: "nested Option cannot distinguish absent from null".to_owned(),
                    });
                }
                Ok(Category::Nullable(Box::new(inner)))
            }
            "Box" | "Arc" | "Rc" => self.classify(single_arg(expr)?),
            "Vec" | "VecDeque" | "LinkedList" => Ok(Category::Collection {
                kind: CollectionKind::List,
                element: Box::new(self.classify(single_arg(expr)?)?),
            }),
            "HashSet" | "BTreeSet" | "IndexSet" => Ok(Category::Collection {
                kind: CollectionKind::Set,
                element: Box::new(self.classify(single_arg(expr)?)?),
            }),
            "HashMap" | "BTreeMap" | "IndexMap" => {
                expect_arity(expr, 2)?;
                Ok(Category::Dictionary {
                    key: Box::new(self.classify(&expr.args[0])?),
                    value: Box::new(self.classify(&expr.args[1])?),
                })
            }
            "DateTime" => {
                let tz = single_arg(expr)?;
                if tz.name == "Utc" && tz.args.is_empty() {
                    Ok(Category::Timestamp(TimestampKind::DateTimeUtc))
                } else {
                    Err(ClassifyError::Unsupported {
                        ty: expr.to_string(),
                        reason: "only UTC date-times are supported".to_owned(),
                    })
                }
            }
            "NaiveDateTime" => {
                expect_arity(expr, 0)?;
                Ok(Category::Timestamp(TimestampKind::NaiveDateTime))
            }
            _ => {
                expect_arity(expr, 0)?;
                self.classify_named(name)
            }
        }
    }

    fn classify_named(&self, name: &str) -> Result<Category, ClassifyError> {
        if let Some(kind) = ScalarKind::from_type_name(name) {
            return Ok(Category::Scalar(kind));
        }
        if self.catalog.is_scalar(name) {
            return Ok(Category::Scalar(ScalarKind::Custom(name.to_owned())));
        }
        if self.catalog.enum_def(name).is_some() {
            return Ok(Category::Enum(name.to_owned()));
        }
        if self.catalog.model(name).is_some() {
            return Ok(Category::Nested(name.to_owned()));
        }
        Err(ClassifyError::UnknownType {
            name: name.to_owned(),
        })
    }
}

fn expect_arity(expr: &TypeExpr, expected: usize) -> Result<(), ClassifyError> {
    if expr.args.len() == expected {
        Ok(())
    } else {
        Err(ClassifyError::Arity {
            name: expr.name.clone(),
            expected,
            found: expr.args.len(),
        })
    }
}

fn single_arg(expr: &TypeExpr) -> Result<&TypeExpr, ClassifyError> {
    expect_arity(expr, 1)?;
    Ok(&expr.args[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::definition::{EnumDefinition, ModelDefinition};

    fn catalog() -> TypeCatalog {
        let mut c = TypeCatalog::new();
        c.register_enum(EnumDefinition::new("Status", ["Active", "Closed"]));
        c.register(ModelDefinition::new("Address"));
        c.register_scalar("Money");
        c
    }

    fn classify(s: &str) -> Result<Category, ClassifyError> {
        let c = catalog();
        TypeClassifier::new(&c).classify_str(s)
    }

    #[test]
    fn test_should_strip_path_prefixes() {
        let expr = TypeExpr::parse("chrono::DateTime< chrono::Utc >").unwrap();
        assert_eq!(expr.to_string(), "DateTime<Utc>");
    }

    #[test]
    fn test_should_classify_nullable_scalar() {
        assert_eq!(
            classify("Option<i64>").unwrap(),
            Category::Nullable(Box::new(Category::Scalar(ScalarKind::I64)))
        );
    }

    #[test]
    fn test_should_classify_dictionary_of_lists() {
        let cat = classify("HashMap<String, Vec<Status>>").unwrap();
        let (key, value) = cat.dictionary().unwrap();
        assert_eq!(key, &Category::Scalar(ScalarKind::String));
        assert_eq!(
            value,
            &Category::Collection {
                kind: CollectionKind::List,
                element: Box::new(Category::Enum("Status".to_owned())),
            }
        );
    }

    #[test]
    fn test_should_classify_list_of_lists() {
        let cat = classify("Vec<Vec<f64>>").unwrap();
        let inner = cat.element().unwrap();
        assert_eq!(inner.element(), Some(&Category::Scalar(ScalarKind::F64)));
    }

    #[test]
    fn test_should_classify_catalog_types() {
        assert_eq!(classify("Address").unwrap(), Category::Nested("Address".to_owned()));
        assert_eq!(
            classify("Money").unwrap(),
            Category::Scalar(ScalarKind::Custom("Money".to_owned()))
        );
        assert_eq!(
            classify("Option<NaiveDateTime>").unwrap().non_null(),
            &Category::Timestamp(TimestampKind::NaiveDateTime)
        );
    }

    #[test]
    fn test_should_see_through_box() {
        assert_eq!(classify("Box<String>").unwrap(), Category::Scalar(ScalarKind::String));
    }

    #[test]
    fn test_should_reject_unknown_type() {
        assert_eq!(
            classify("Vec<Widget>").unwrap_err(),
            ClassifyError::UnknownType {
                name: "Widget".to_owned()
            }
        );
    }

    #[test]
    fn test_should_reject_wrong_arity() {
        assert!(matches!(
            classify("HashMap<String>"),
            Err(ClassifyError::Arity { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_should_reject_non_utc_datetime() {
        assert!(matches!(
            classify("DateTime<Local>"),
            Err(ClassifyError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_should_reject_nested_option() {
        assert!(matches!(
            classify("Option<Option<String>>"),
            Err(ClassifyError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_should_reject_malformed_expression() {
        assert!(matches!(classify("Vec<String"), Err(ClassifyError::Syntax { .. })));
        assert!(matches!(classify("(i32, i32)"), Err(ClassifyError::Syntax { .. })));
    }

    #[test]
    fn test_should_reject_trailing_input() {
        let err = TypeExpr::parse("Vec<String> > ").unwrap_err();
        assert_eq!(
            err,
            ClassifyError::Syntax {
                expr: "Vec<String> > ".to_owned(),
                message: "unexpected '>' after type".to_owned(),
            }
        );
    }
}
