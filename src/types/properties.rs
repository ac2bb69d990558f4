//! Optional per-field properties

use super::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property names a field may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    AllowNull,
    Default,
    Precision,
    Scale,
    Collation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Value(FieldValue),
}

/// Property map attached to a field definition
///
/// Absent keys fall back to engine defaults: nulls allowed, no default
/// value, precision and scale unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldProperties {
    entries: BTreeMap<PropertyKey, PropertyValue>,
}

impl FieldProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allow_null(mut self, allow: bool) -> Self {
        self.entries.insert(PropertyKey::AllowNull, PropertyValue::Bool(allow));
        self
    }

    pub fn with_default(mut self, value: FieldValue) -> Self {
        self.entries.insert(PropertyKey::Default, PropertyValue::Value(value));
        self
    }

    pub fn with_precision(mut self, precision: i64) -> Self {
        self.entries.insert(PropertyKey::Precision, PropertyValue::Int(precision));
        self
    }

    pub fn with_scale(mut self, scale: i64) -> Self {
        self.entries.insert(PropertyKey::Scale, PropertyValue::Int(scale));
        self
    }

    pub fn with_collation(mut self, collation: &str) -> Self {
        self.entries
            .insert(PropertyKey::Collation, PropertyValue::Text(collation.to_string()));
        self
    }

    pub fn allow_null(&self) -> bool {
        match self.entries.get(&PropertyKey::AllowNull) {
            Some(PropertyValue::Bool(b)) => *b,
            _ => true,
        }
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        match self.entries.get(&PropertyKey::Default) {
            Some(PropertyValue::Value(v)) => Some(v),
            _ => None,
        }
    }

    pub fn precision(&self) -> Option<i64> {
        self.int(PropertyKey::Precision)
    }

    pub fn scale(&self) -> Option<i64> {
        self.int(PropertyKey::Scale)
    }

    pub fn get(&self, key: PropertyKey) -> Option<&PropertyValue> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn int(&self, key: PropertyKey) -> Option<i64> {
        match self.entries.get(&key) {
            Some(PropertyValue::Int(v)) => Some(*v),
            _ => None,
        }
    }
}
