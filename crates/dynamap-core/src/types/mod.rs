//! Property type classification and per-type conversion rules.

pub mod category;
pub mod classify;
pub mod handler;
pub mod registry;
pub mod rule;

pub use category::{Category, CollectionKind, ScalarKind, TimestampKind};
pub use classify::{ClassifyError, TypeClassifier, TypeExpr};
pub use handler::{Leaf, TypeHandler, ValueError};
pub use registry::{CompileContext, HandlerRegistry, PropertyRules};
pub use rule::{DecodeRule, EncodeRule, KeyRule, Rule};
