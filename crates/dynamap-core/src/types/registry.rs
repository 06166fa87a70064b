//! Handler registry and rule compilation.

use std::sync::Arc;

use tracing::trace;

use super::category::{Category, CollectionKind, ScalarKind};
use super::classify::ClassifyError;
use super::handler::{EnumHandler, EpochTimestampHandler, Leaf, PrimitiveHandler, TypeHandler};
use super::rule::{DecodeRule, EncodeRule, KeyRule, Rule};
use crate::schema::definition::TimestampPrecision;
use crate::schema::descriptor::PropertyDescriptor;

/// What rule compilation needs from its surroundings: enum members and
/// compiled nested object types.
pub trait CompileContext {
    /// Member names of an enum, if it is known.
    fn enum_members(&self, name: &str) -> Option<Arc<[String]>>;

    /// Rule for a nested object type.
    fn nested(&mut self, name: &str, registry: &HandlerRegistry) -> Result<Rule, ClassifyError>;
}

/// Both directions of a property's conversion.
#[derive(Debug, Clone)]
pub struct PropertyRules {
    /// Write rule.
    pub encode: EncodeRule,
    /// Read rule.
    pub decode: DecodeRule,
}

/// Ordered list of leaf handlers; the first handler whose predicate matches
/// wins.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn TypeHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerRegistry {
    /// Registry with the built-in handlers, most specific first.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            handlers: vec![
                Arc::new(EpochTimestampHandler),
                Arc::new(EnumHandler),
                Arc::new(PrimitiveHandler),
            ],
        }
    }

    /// Register a handler ahead of every existing one.
    pub fn register<H: TypeHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(0, Arc::new(handler));
    }

    /// Handler names in dispatch order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.name())
    }

    /// The first handler claiming `leaf`.
    #[must_use]
    pub fn bind(&self, leaf: &Leaf) -> Option<Arc<dyn TypeHandler>> {
        let handler = self.handlers.iter().find(|h| h.handles(leaf)).cloned();
        if let Some(h) = &handler {
            trace!(handler = h.name(), ty = %leaf.category, "bound leaf handler");
        }
        handler
    }

    /// Compile both rules for a property.
    pub fn rules_for(
        &self,
        property: &PropertyDescriptor,
        ctx: &mut dyn CompileContext,
    ) -> Result<PropertyRules, ClassifyError> {
        let rule = Arc::new(self.compile(property.category.non_null(), property.timestamp, ctx)?);
        Ok(if property.nullable {
            PropertyRules {
                encode: EncodeRule::Conditional(Arc::clone(&rule)),
                decode: DecodeRule::Optional(rule),
            }
        } else {
            PropertyRules {
                encode: EncodeRule::Direct(Arc::clone(&rule)),
                decode: DecodeRule::Required(rule),
            }
        })
    }

    /// Write rule for a property: `Conditional` when nullable, else `Direct`.
    pub fn encode_rule(
        &self,
        property: &PropertyDescriptor,
        ctx: &mut dyn CompileContext,
    ) -> Result<EncodeRule, ClassifyError> {
        self.rules_for(property, ctx).map(|r| r.encode)
    }

    /// Read rule for a property: `Optional` when nullable, else `Required`.
    pub fn decode_rule(
        &self,
        property: &PropertyDescriptor,
        ctx: &mut dyn CompileContext,
    ) -> Result<DecodeRule, ClassifyError> {
        self.rules_for(property, ctx).map(|r| r.decode)
    }

    /// Compile a category into a rule tree.
    ///
    /// `precision` applies to a timestamp at this position or directly under
    /// an `Option`; container elements never inherit it.
    pub fn compile(
        &self,
        category: &Category,
        precision: Option<TimestampPrecision>,
        ctx: &mut dyn CompileContext,
    ) -> Result<Rule, ClassifyError> {
        match category {
            Category::Nullable(inner) => Ok(Rule::Optional(Box::new(
                self.compile(inner, precision, ctx)?,
            ))),
            Category::Scalar(_) | Category::Timestamp(_) => self.leaf(Leaf {
                precision,
                ..Leaf::new(category.clone())
            }),
            Category::Enum(name) => {
                let members = ctx
                    .enum_members(name)
                    .ok_or_else(|| ClassifyError::UnknownType { name: name.clone() })?;
                self.leaf(Leaf {
                    enum_members: Some(members),
                    ..Leaf::new(category.clone())
                })
            }
            Category::Collection {
                kind: CollectionKind::List,
                element,
            } => Ok(Rule::List(Box::new(self.compile(element, None, ctx)?))),
            Category::Collection {
                kind: CollectionKind::Set,
                element,
            } => {
                let numeric = set_wire_kind(category, element)?;
                Ok(Rule::Set {
                    element: Box::new(self.compile(element, None, ctx)?),
                    numeric,
                })
            }
            Category::Dictionary { key, value } => Ok(Rule::Map {
                key: key_rule(category, key, ctx)?,
                value: Box::new(self.compile(value, None, ctx)?),
            }),
            Category::Nested(name) => ctx.nested(name, self),
        }
    }

    fn leaf(&self, leaf: Leaf) -> Result<Rule, ClassifyError> {
        let handler = self.bind(&leaf).ok_or_else(|| ClassifyError::Unsupported {
            ty: leaf.category.to_string(),
            reason: "no registered handler accepts this type".to_owned(),
        })?;
        Ok(Rule::Leaf { handler, leaf })
    }
}

/// `true` for `NS`, `false` for `SS`.
fn set_wire_kind(set: &Category, element: &Category) -> Result<bool, ClassifyError> {
    match element {
        Category::Scalar(kind) if kind.is_numeric() => Ok(true),
        Category::Scalar(kind) if kind.is_textual() => Ok(false),
        Category::Enum(_) | Category::Timestamp(_) => Ok(false),
        _ => Err(ClassifyError::Unsupported {
            ty: set.to_string(),
            reason: "set elements must be string-like or numeric".to_owned(),
        }),
    }
}

fn key_rule(
    dict: &Category,
    key: &Category,
    ctx: &dyn CompileContext,
) -> Result<KeyRule, ClassifyError> {
    match key {
        Category::Scalar(ScalarKind::String) => Ok(KeyRule::Text),
        Category::Scalar(ScalarKind::Char) => Ok(KeyRule::Char),
        Category::Scalar(ScalarKind::Uuid) => Ok(KeyRule::Uuid),
        Category::Scalar(kind) if kind.is_integral() => Ok(KeyRule::Integral(kind.clone())),
        Category::Enum(name) => Ok(KeyRule::Enum {
            name: name.clone(),
            members: ctx
                .enum_members(name)
                .ok_or_else(|| ClassifyError::UnknownType { name: name.clone() })?,
        }),
        _ => Err(ClassifyError::Unsupported {
            ty: dict.to_string(),
            reason: "dictionary keys must be string, integral, GUID or enum".to_owned(),
        }),
    }
}
