//! Query Builder DML operations (INSERT, UPDATE, DELETE, counters)
//!
//! Write statements are compiled with the same primitives as reads: columns
//! render in one pass with their bindings, and the shared WHERE compiler
//! supplies filter text and filter bindings in textual order (SET bindings
//! first, WHERE bindings after).

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};

use super::builder::QueryBuilder;
use super::execution::run_statement;

/// Multi-row inserts are split into chunks of this many rows to bound
/// statement size.
pub(crate) const INSERT_CHUNK_SIZE: usize = 500;

pub(crate) const CREATED_AT: &str = "created_at";
pub(crate) const UPDATED_AT: &str = "updated_at";

pub(crate) fn timestamp_now() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Deterministic column order for a row map.
fn sorted_columns(row: &HashMap<String, Value>) -> Vec<String> {
    let mut columns: Vec<String> = row.keys().cloned().collect();
    columns.sort();
    columns
}

impl QueryBuilder {
    pub(crate) fn fill_insert_timestamps(&self, row: &mut HashMap<String, Value>) {
        if !self.timestamps {
            return;
        }
        let now = timestamp_now();
        row.entry(CREATED_AT.to_string()).or_insert_with(|| now.clone());
        row.entry(UPDATED_AT.to_string()).or_insert(now);
    }

    /// Insert one row and return the generated identifier.
    pub async fn insert(
        self,
        conn: &dyn Connection,
        attributes: HashMap<String, Value>,
    ) -> ModelResult<i64> {
        if attributes.is_empty() {
            return Err(ModelError::Validation(
                "insert requires at least one column".to_string(),
            ));
        }
        let mut row = attributes;
        self.fill_insert_timestamps(&mut row);

        let columns = sorted_columns(&row);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders
        );
        let bindings: Vec<Value> = columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();

        run_statement(conn, &sql, &bindings).await?;
        conn.last_insert_id().await
    }

    /// Insert many rows in fixed-size chunks, returning the summed
    /// affected-row count. Every row must carry the identical column set.
    pub async fn insert_many(
        self,
        conn: &dyn Connection,
        rows: Vec<HashMap<String, Value>>,
    ) -> ModelResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut rows = rows;
        for row in &mut rows {
            self.fill_insert_timestamps(row);
        }

        let columns = sorted_columns(&rows[0]);
        for row in &rows {
            if sorted_columns(row) != columns {
                return Err(ModelError::Validation(
                    "insert_many requires an identical column set in every row".to_string(),
                ));
            }
        }

        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let mut affected = 0u64;

        for chunk in rows.chunks(INSERT_CHUNK_SIZE) {
            let values_clause = vec![row_placeholders.as_str(); chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.table,
                columns.join(", "),
                values_clause
            );
            let bindings: Vec<Value> = chunk
                .iter()
                .flat_map(|row| {
                    columns
                        .iter()
                        .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                })
                .collect();
            affected += run_statement(conn, &sql, &bindings).await?;
        }

        Ok(affected)
    }

    /// Update matching rows, returning the affected-row count.
    pub async fn update(
        self,
        conn: &dyn Connection,
        attributes: HashMap<String, Value>,
    ) -> ModelResult<u64> {
        if attributes.is_empty() {
            return Err(ModelError::Validation(
                "update requires at least one column".to_string(),
            ));
        }
        let mut row = attributes;
        if self.timestamps {
            row.entry(UPDATED_AT.to_string())
                .or_insert_with(timestamp_now);
        }

        let columns = sorted_columns(&row);
        let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c)).collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        let mut bindings: Vec<Value> = columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();

        self.compile_wheres_into(&mut sql, &mut bindings);
        run_statement(conn, &sql, &bindings).await
    }

    /// Delete matching rows, returning the affected-row count.
    pub async fn delete(self, conn: &dyn Connection) -> ModelResult<u64> {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut bindings = Vec::new();
        self.compile_wheres_into(&mut sql, &mut bindings);
        run_statement(conn, &sql, &bindings).await
    }

    /// Add `amount` to a numeric column on all matching rows.
    pub async fn increment(
        self,
        conn: &dyn Connection,
        column: &str,
        amount: i64,
    ) -> ModelResult<u64> {
        self.adjust_counter(conn, column, "+", amount).await
    }

    /// Subtract `amount` from a numeric column on all matching rows.
    pub async fn decrement(
        self,
        conn: &dyn Connection,
        column: &str,
        amount: i64,
    ) -> ModelResult<u64> {
        self.adjust_counter(conn, column, "-", amount).await
    }

    async fn adjust_counter(
        self,
        conn: &dyn Connection,
        column: &str,
        sign: &str,
        amount: i64,
    ) -> ModelResult<u64> {
        let mut sql = format!(
            "UPDATE {} SET {} = {} {} ?",
            self.table, column, column, sign
        );
        let mut bindings = vec![Value::from(amount)];
        if self.timestamps {
            sql.push_str(&format!(", {} = ?", UPDATED_AT));
            bindings.push(timestamp_now());
        }
        self.compile_wheres_into(&mut sql, &mut bindings);
        run_statement(conn, &sql, &bindings).await
    }
}
