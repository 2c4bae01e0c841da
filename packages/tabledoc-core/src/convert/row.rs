use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::mapping::DOCUMENT_COLUMN;
use crate::types::FieldValue;

/// A flat column → value map: primary key columns plus the document column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, FieldValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    /// Sets a column, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(column.into(), value)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn remove(&mut self, column: &str) -> Option<FieldValue> {
        self.0.remove(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// The document column as a map; `None` if absent or not a map.
    pub fn document(&self) -> Option<&BTreeMap<String, FieldValue>> {
        self.get(DOCUMENT_COLUMN).and_then(FieldValue::as_map)
    }

    pub fn as_map(&self) -> &BTreeMap<String, FieldValue> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, FieldValue> {
        self.0
    }
}

impl From<BTreeMap<String, FieldValue>> for Row {
    fn from(map: BTreeMap<String, FieldValue>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, FieldValue)> for Row {
    fn extend<I: IntoIterator<Item = (String, FieldValue)>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl IntoIterator for Row {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}
