//! Schema-driven model-to-item codec engine for Dynamap.
//!
//! Models describe themselves as plain data ([`schema::ModelDefinition`]s in
//! a [`schema::TypeCatalog`]): key templates such as `"ORDER#<Id>"`,
//! secondary-index templates, and per-property markers. The
//! [`schema::SchemaAnalyzer`] validates and flattens a model into a
//! descriptor, reporting every problem as a [`diagnostics::Diagnostic`].
//! [`codec::ItemCodec`] then compiles the descriptor once into a tree of
//! conversion rules; encoding and decoding are walks over that tree.
//!
//! The [`mapper::Mapper`] ties it together for serde-reflected Rust types:
//!
//! ```
//! use dynamap_core::mapper::{Entity, Mapper};
//! use dynamap_core::schema::{ModelDefinition, PropertyDefinition, TypeCatalog};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     email: Option<String>,
//! }
//!
//! impl Entity for User {
//!     const TYPE_NAME: &'static str = "User";
//!
//!     fn describe(catalog: &mut TypeCatalog) {
//!         catalog.register(
//!             ModelDefinition::new("User")
//!                 .with_key("USER#<id>", "PROFILE")
//!                 .with_property(PropertyDefinition::new("id", "String"))
//!                 .with_property(PropertyDefinition::new("email", "Option<String>")),
//!         );
//!     }
//! }
//!
//! let mapper = Mapper::default();
//! let user = User { id: "u1".to_owned(), email: None };
//! let item = mapper.encode(&user).unwrap();
//! assert_eq!(item.key_text("PK"), Some("USER#u1"));
//! assert!(!item.contains("email"));
//! assert_eq!(mapper.decode_item::<User>(&item).unwrap(), user);
//! ```
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod mapper;
pub mod schema;
pub mod template;
pub mod types;

pub use codec::{ItemCodec, Variant, VariantRegistry};
pub use config::CodecConfig;
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use error::{CodecError, DecodeError, EncodeError, SchemaError};
pub use mapper::{Entity, Mapper, Polymorphic, RecordDecoder, TypedCodec};

pub use dynamap_model::{AttributeValue, Item, KeyContext};
