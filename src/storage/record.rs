//! Item records
//!
//! A record is an open mapping from column name to string value. Columns keep
//! the order in which they were first set so that files written from records
//! have a stable, readable header.

use std::collections::HashSet;

/// One extracted item: ordered column/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemRecord {
    fields: Vec<(String, String)>,
}

impl ItemRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`ItemRecord::insert`]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a column, replacing the value in place if the column exists
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Returns the value of a column
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the column is set and non-blank
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Column/value pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for ItemRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = ItemRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Builds the union of columns across records, in first-seen order
pub fn union_columns<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ItemRecord>,
{
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for column in record.columns() {
            if seen.insert(column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
