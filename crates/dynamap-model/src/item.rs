//! A stored record and the key pair that identifies it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AttributeValue;

/// One stored record: attribute name to value.
///
/// Attribute names are exact, case-sensitive wire names. Iteration order is
/// sorted by name so encoded items compare and print deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(BTreeMap<String, AttributeValue>);

impl Item {
    /// Create an empty item.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.0.get(name)
    }

    /// Whether the attribute is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Insert or replace an attribute, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: AttributeValue,
    ) -> Option<AttributeValue> {
        self.0.insert(name.into(), value)
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.0.remove(name)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the item has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Text of an `S` or `N` attribute.
    #[must_use]
    pub fn key_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::key_text)
    }

    /// Consume into the underlying map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, AttributeValue> {
        self.0
    }
}

impl From<BTreeMap<String, AttributeValue>> for Item {
    fn from(map: BTreeMap<String, AttributeValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, AttributeValue)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Item {
    type Item = (String, AttributeValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Partition/sort key values of a record, carried by decode errors so a bad
/// record can be located.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyContext {
    /// Partition key value, if known.
    pub pk: Option<String>,
    /// Sort key value, if known.
    pub sk: Option<String>,
}

impl KeyContext {
    /// Key context with both values known.
    #[must_use]
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: Some(pk.into()),
            sk: Some(sk.into()),
        }
    }

    /// Read the key pair out of an item given the key attribute names.
    #[must_use]
    pub fn from_item(item: &Item, pk_attribute: &str, sk_attribute: &str) -> Self {
        Self {
            pk: item.key_text(pk_attribute).map(str::to_owned),
            sk: item.key_text(sk_attribute).map(str::to_owned),
        }
    }
}

impl fmt::Display for KeyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PK={}, SK={}",
            self.pk.as_deref().unwrap_or("<unknown>"),
            self.sk.as_deref().unwrap_or("<unknown>")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_as_plain_object() {
        let mut item = Item::new();
        item.insert("SK", AttributeValue::S("METADATA".to_owned()));
        item.insert("PK", AttributeValue::S("ENTITY#1".to_owned()));
        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"PK":{"S":"ENTITY#1"},"SK":{"S":"METADATA"}}"#);
    }

    #[test]
    fn test_should_keep_attribute_names_case_sensitive() {
        let mut item = Item::new();
        item.insert("name", AttributeValue::S("a".to_owned()));
        assert!(item.contains("name"));
        assert!(!item.contains("Name"));
    }

    #[test]
    fn test_should_extract_key_context() {
        let mut item = Item::new();
        item.insert("PK", AttributeValue::S("USER#7".to_owned()));
        item.insert("SK", AttributeValue::number(3));
        let key = KeyContext::from_item(&item, "PK", "SK");
        assert_eq!(key, KeyContext::new("USER#7", "3"));
        assert_eq!(key.to_string(), "PK=USER#7, SK=3");
    }

    #[test]
    fn test_should_report_unknown_keys() {
        let key = KeyContext::from_item(&Item::new(), "PK", "SK");
        assert_eq!(key.to_string(), "PK=<unknown>, SK=<unknown>");
    }
}
