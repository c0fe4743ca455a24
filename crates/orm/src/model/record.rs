//! Record - mutable attribute map plus loaded relations and dirty tracking
//!
//! A `Record` is one materialized result row: column name to dynamic value,
//! a snapshot of the values as they were at load time, a side map of loaded
//! relation values, and (for many-to-many results only) the pivot-table
//! columns of the pairing that produced it.

use std::collections::HashMap;

use serde_json::Value;

use crate::backends::SqlRow;

/// A loaded relation value attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Single related record or null (has-one / belongs-to).
    One(Option<Box<Record>>),
    /// Sub-collection of related records (has-many / many-to-many).
    Many(Vec<Record>),
}

impl Related {
    /// The single related record, if this is a loaded `One`.
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            Related::One(record) => record.as_deref(),
            Related::Many(_) => None,
        }
    }

    /// The sub-collection, if this is a loaded `Many`.
    pub fn as_many(&self) -> Option<&[Record]> {
        match self {
            Related::Many(records) => Some(records),
            Related::One(_) => None,
        }
    }
}

/// One database entity instance as a dynamic attribute map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: HashMap<String, Value>,
    original: HashMap<String, Value>,
    relations: HashMap<String, Related>,
    pivot: Option<HashMap<String, Value>>,
}

impl Record {
    /// Build a record from a fetched row, snapshotting the attributes as
    /// the "original" state for dirty checking.
    pub fn from_row(row: SqlRow) -> Self {
        Self::from_attributes(row.into_values())
    }

    pub fn from_attributes(attributes: HashMap<String, Value>) -> Self {
        Self {
            original: attributes.clone(),
            attributes,
            relations: HashMap::new(),
            pivot: None,
        }
    }

    /// Get an attribute value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    /// Set an attribute value. Does not touch the original snapshot.
    pub fn set(&mut self, column: &str, value: Value) {
        self.attributes.insert(column.to_string(), value);
    }

    /// Remove an attribute, returning its value.
    pub fn take(&mut self, column: &str) -> Option<Value> {
        self.attributes.remove(column)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Attributes whose current value differs from the load-time snapshot,
    /// including attributes added since load.
    pub fn dirty(&self) -> HashMap<String, Value> {
        self.attributes
            .iter()
            .filter(|(column, value)| self.original.get(*column) != Some(*value))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(column, value)| self.original.get(column) != Some(value))
    }

    /// Re-snapshot the current attributes as the original state, e.g. after
    /// a successful save.
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// A loaded relation value by name.
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut Related> {
        self.relations.get_mut(name)
    }

    pub fn relation_loaded(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn set_relation(&mut self, name: &str, related: Related) {
        self.relations.insert(name.to_string(), related);
    }

    /// Pivot-table columns for this record's parent pairing, present only
    /// on records materialized through a many-to-many load.
    pub fn pivot(&self) -> Option<&HashMap<String, Value>> {
        self.pivot.as_ref()
    }

    pub fn set_pivot(&mut self, pivot: HashMap<String, Value>) {
        self.pivot = Some(pivot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Record {
        Record::from_attributes(HashMap::from([
            ("id".to_string(), json!(1)),
            ("name".to_string(), json!("A")),
        ]))
    }

    #[test]
    fn dirty_tracking_against_load_snapshot() {
        let mut rec = record();
        assert!(!rec.is_dirty());

        rec.set("name", json!("B"));
        rec.set("age", json!(20));
        assert!(rec.is_dirty());

        let dirty = rec.dirty();
        assert_eq!(dirty.len(), 2);
        assert_eq!(dirty.get("name"), Some(&json!("B")));
        assert_eq!(dirty.get("age"), Some(&json!(20)));

        rec.sync_original();
        assert!(!rec.is_dirty());
    }

    #[test]
    fn relation_accessors() {
        let mut rec = record();
        assert!(!rec.relation_loaded("posts"));

        rec.set_relation("posts", Related::Many(vec![record()]));
        assert!(rec.relation_loaded("posts"));
        assert_eq!(rec.relation("posts").unwrap().as_many().unwrap().len(), 1);
        assert!(rec.relation("posts").unwrap().as_one().is_none());
    }
}
