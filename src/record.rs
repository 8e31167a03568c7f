//! Record type for Record Store
//!
//! A record is an ordered map from unique field names to typed values. Field
//! order matters: the first field of the first record saved into a new store
//! becomes that store's primary column.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{RecordStoreError, Result};
use crate::types::Value;

/// Ordered field map persisted as one row of a store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field, keeping its position when it already exists
    ///
    /// Returns the previous value of the field, if any.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let field = field.into();
        let value = value.into();
        match self.fields.iter().position(|(name, _)| *name == field) {
            Some(position) => Some(std::mem::replace(&mut self.fields[position].1, value)),
            None => {
                self.fields.push((field, value));
                None
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(position).1)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    /// Field names in record order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of the first field, if any
    pub fn first_key(&self) -> Option<&str> {
        self.fields.first().map(|(name, _)| name.as_str())
    }

    /// True when both records hold the same field names in the same order
    pub fn same_shape(&self, other: &Record) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }

    /// Build a record from a JSON object
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(key, value)| (key, Value::from_json(value)))
                .collect()),
            _ => Err(RecordStoreError::validation("Record must be a JSON object")),
        }
    }

    /// Convert the record into a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.insert(field, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
