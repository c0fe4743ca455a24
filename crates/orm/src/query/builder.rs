//! Query Builder - Core builder implementation
//!
//! One builder instance is one in-flight query specification, owned by one
//! logical call chain. Reusing a partially-built query goes through
//! `clone()`, never through sharing; the pagination path relies on this to
//! strip ordering and limits off a cloned counting query.

use std::sync::Arc;

use serde_json::Value;

use super::types::{ConditionEntry, JoinClause, OrderEntry, SelectField};
use super::with::EagerLoadSpec;
use crate::relationships::registry::RelationshipRegistry;

/// Fluent builder for SELECT/INSERT/UPDATE/DELETE statements against one
/// table, with optional entity metadata for relationship resolution.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(crate) table: String,
    /// Entity name used for relationship-registry lookups, when known.
    pub(crate) entity: Option<String>,
    pub(crate) primary_key: String,
    pub(crate) timestamps: bool,
    pub(crate) registry: Option<Arc<RelationshipRegistry>>,
    pub(crate) select_fields: Vec<SelectField>,
    pub(crate) conditions: Vec<ConditionEntry>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) group_by: Vec<String>,
    pub(crate) order_by: Vec<OrderEntry>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) distinct: bool,
    pub(crate) eager_loads: Vec<EagerLoadSpec>,
}

impl QueryBuilder {
    /// Create a builder scoped to a table, with no entity metadata.
    pub fn from_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            entity: None,
            primary_key: "id".to_string(),
            timestamps: false,
            registry: None,
            select_fields: Vec::new(),
            conditions: Vec::new(),
            joins: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit_count: None,
            offset_value: None,
            distinct: false,
            eager_loads: Vec::new(),
        }
    }

    /// Create a builder for a registered entity. The registry is consulted
    /// for eager loads and existence filters.
    pub fn for_entity(entity: &str, table: &str, registry: Arc<RelationshipRegistry>) -> Self {
        let mut builder = Self::from_table(table);
        builder.entity = Some(entity.to_string());
        builder.registry = Some(registry);
        builder
    }

    /// Override the primary key column (defaults to `id`).
    pub fn with_primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    /// Mark the target entity as timestamped: insert and upsert paths then
    /// maintain `created_at` / `updated_at`.
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary_key_name(&self) -> &str {
        &self.primary_key
    }

    /// Select only distinct rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Apply `apply` only when `value` is present per [`is_present`]. The
    /// callback receives the value so it does not have to re-check it.
    pub fn when<T, F>(self, value: T, apply: F) -> Self
    where
        T: Into<Value>,
        F: FnOnce(Self, Value) -> Self,
    {
        let value = value.into();
        if is_present(&value) {
            apply(self, value)
        } else {
            self
        }
    }
}

/// The one coercion predicate for conditional query building: null, false,
/// zero, the empty string, and the empty array count as absent; everything
/// else is present.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() != Some(0) && n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}
