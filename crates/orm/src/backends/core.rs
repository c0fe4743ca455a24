//! Core Database Backend Traits
//!
//! The connection and prepared-statement primitives are external
//! collaborators: this crate never opens sockets or speaks a wire protocol.
//! These traits define exactly what the query and eager-loading layers
//! consume, so any driver (or a test double) can sit behind them.
//!
//! A `Statement` implementation must release its underlying cursor and
//! server-side handle in `Drop`. The execution layer relies on that for the
//! lazy-fetch path: normal exhaustion, early abandonment, and error exits
//! all funnel through the same drop.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrmResult;

/// A value at the binding boundary, tagged with its storage type.
///
/// Inference from a dynamic [`Value`]: integers bind as integers, booleans
/// as booleans, null as null, everything else (strings, non-integral
/// numbers, arrays, objects) as text.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Integer(i64),
    Boolean(bool),
    Null,
    Text(String),
}

impl From<&Value> for BindValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => BindValue::Integer(i),
                None => BindValue::Text(n.to_string()),
            },
            Value::String(s) => BindValue::Text(s.clone()),
            other => BindValue::Text(other.to_string()),
        }
    }
}

/// One fetched result row: column name to dynamic value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    values: HashMap<String, Value>,
}

impl SqlRow {
    pub fn new(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Consume the row, yielding the raw attribute map.
    pub fn into_values(self) -> HashMap<String, Value> {
        self.values
    }
}

impl FromIterator<(String, Value)> for SqlRow {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Abstract prepared-statement handle.
#[async_trait]
pub trait Statement: Send {
    /// Bind a positional parameter (zero-based index).
    fn bind(&mut self, index: usize, value: BindValue) -> OrmResult<()>;

    /// Execute the statement with the currently bound parameters.
    async fn execute(&mut self) -> OrmResult<()>;

    /// Fetch the next result row, or `None` at end of results.
    async fn fetch_row(&mut self) -> OrmResult<Option<SqlRow>>;

    /// Number of rows affected by the last execution.
    fn row_count(&self) -> u64;
}

/// Abstract database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Prepare a statement for the given SQL text.
    async fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement>>;

    /// Identifier generated by the most recent single-row insert.
    async fn last_insert_id(&self) -> OrmResult<i64>;

    /// Ordered column names of a table, from schema introspection.
    ///
    /// Consumed only when a `SELECT *` projection meets a GROUP BY and the
    /// star has to be expanded before the group-safety rewrite.
    async fn columns_of(&self, table: &str) -> OrmResult<Vec<String>>;
}

/// Bind a compiled parameter list onto a statement, left to right, applying
/// storage-type inference. Binding order is the compile order, which is the
/// placeholder order.
pub fn bind_values(statement: &mut dyn Statement, values: &[Value]) -> OrmResult<()> {
    for (index, value) in values.iter().enumerate() {
        statement.bind(index, BindValue::from(value))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bind_value_inference() {
        assert_eq!(BindValue::from(&json!(42)), BindValue::Integer(42));
        assert_eq!(BindValue::from(&json!(true)), BindValue::Boolean(true));
        assert_eq!(BindValue::from(&Value::Null), BindValue::Null);
        assert_eq!(
            BindValue::from(&json!("alice")),
            BindValue::Text("alice".to_string())
        );
        // Non-integral numbers fall back to text
        assert_eq!(
            BindValue::from(&json!(1.5)),
            BindValue::Text("1.5".to_string())
        );
    }
}
