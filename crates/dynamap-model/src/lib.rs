//! Wire-level types for Dynamap.
//!
//! This crate holds the tagged-union [`AttributeValue`] and the [`Item`] map
//! that the codec engine produces and consumes. Both serialize to the JSON
//! item format used by DynamoDB's HTTP protocol, so a transport layer can put
//! them on the wire without further conversion.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]

pub mod attribute_value;
pub mod item;

pub use attribute_value::AttributeValue;
pub use item::{Item, KeyContext};
