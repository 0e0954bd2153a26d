//! Purpose: Typed key/value view of one row, plus its non-persisted position.
//! Exports: `Record`.
//! Role: The unit callers exchange with `Table`; rows are the durable entity.
//! Invariants: Keys not present in a table's header set are ignored on write, never rejected.
//! Invariants: `index` is never persisted; it is absent for records not yet inserted.

use crate::core::value::Value;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A record is an ordered mapping of column name to cell value. Key order is
/// stable (sorted), which also makes the version stamp (`core::version`)
/// independent of insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
    index: Option<usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment: `Record::new().with("name", "Alice")`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Zero-based logical row this record maps to; `None` before first insert.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// Column names carried by this record, used as migration input when a
    /// record stands in for a schema shape.
    pub fn column_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Copy of this record without derived columns, useful when comparing
    /// round-tripped data against its input.
    pub fn without_columns(&self, columns: &[&str]) -> Self {
        let values = self
            .values
            .iter()
            .filter(|(name, _)| !columns.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            values,
            index: self.index,
        }
    }
}

impl serde::Serialize for Record {
    /// JSON form: one key per column, plus `_index` when the record has been
    /// placed (mirrors the wire shape of diff output).
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let extra = usize::from(self.index.is_some());
        let mut map = serializer.serialize_map(Some(self.values.len() + extra))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, &value.to_json())?;
        }
        if let Some(index) = self.index {
            map.serialize_entry("_index", &index)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::core::value::Value;

    #[test]
    fn builder_and_access() {
        let record = Record::new().with("name", "Alice").with("age", 30i64);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("name"), Some(&Value::text("Alice")));
        assert_eq!(record.get("age"), Some(&Value::Number(30.0)));
        assert!(record.index().is_none());
    }

    #[test]
    fn index_is_separate_from_values() {
        let mut record = Record::new().with("name", "Bob");
        record.set_index(3);
        assert_eq!(record.index(), Some(3));
        assert_eq!(record.len(), 1);
        assert!(!record.contains("index"));
    }

    #[test]
    fn without_columns_drops_named_fields() {
        let record = Record::new()
            .with("name", "Alice")
            .with("lock_version", "abc")
            .with_index(1);
        let trimmed = record.without_columns(&["lock_version"]);
        assert_eq!(trimmed.column_names(), vec!["name".to_string()]);
        assert_eq!(trimmed.index(), Some(1));
    }
}
