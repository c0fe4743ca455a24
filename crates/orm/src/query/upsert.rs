//! Query Builder UPSERT operations (INSERT ... ON CONFLICT UPDATE)

use std::collections::HashMap;

use serde_json::Value;

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};

use super::builder::QueryBuilder;
use super::dml::UPDATED_AT;
use super::execution::run_statement;

/// Builder for upsert statements. Requires at least one unique-by column;
/// the update set defaults to every inserted column minus the unique-by
/// set, and always carries the update timestamp when the entity uses
/// timestamps.
#[derive(Debug, Clone)]
pub struct UpsertBuilder {
    query: QueryBuilder,
    rows: Vec<HashMap<String, Value>>,
    unique_by: Vec<String>,
    update_columns: Option<Vec<String>>,
    ignore_errors: bool,
}

impl QueryBuilder {
    /// Start an upsert for the given rows, keyed on the unique-by columns.
    pub fn upsert(self, rows: Vec<HashMap<String, Value>>, unique_by: Vec<&str>) -> UpsertBuilder {
        UpsertBuilder {
            query: self,
            rows,
            unique_by: unique_by.into_iter().map(str::to_string).collect(),
            update_columns: None,
            ignore_errors: false,
        }
    }
}

impl UpsertBuilder {
    /// Override the update-column set applied on conflict.
    pub fn update_only(mut self, columns: Vec<&str>) -> Self {
        self.update_columns = Some(columns.into_iter().map(str::to_string).collect());
        self
    }

    /// Convert a backend error into a zero-affected-rows result instead of
    /// propagating it.
    pub fn ignore_errors(mut self) -> Self {
        self.ignore_errors = true;
        self
    }

    fn compile(&self) -> ModelResult<Option<(String, Vec<Value>)>> {
        if self.unique_by.is_empty() {
            return Err(ModelError::Validation(
                "upsert requires at least one unique-by column".to_string(),
            ));
        }
        if self.rows.is_empty() {
            return Ok(None);
        }

        let mut rows = self.rows.clone();
        for row in &mut rows {
            self.query.fill_insert_timestamps(row);
        }

        let mut columns: Vec<String> = rows[0].keys().cloned().collect();
        columns.sort();
        for row in &rows {
            let mut row_columns: Vec<&String> = row.keys().collect();
            row_columns.sort();
            if row_columns.len() != columns.len()
                || row_columns.iter().zip(&columns).any(|(a, b)| *a != b)
            {
                return Err(ModelError::Validation(
                    "upsert requires an identical column set in every row".to_string(),
                ));
            }
        }

        let mut update_columns = match &self.update_columns {
            Some(overridden) => overridden.clone(),
            None => columns
                .iter()
                .filter(|column| !self.unique_by.contains(column))
                .cloned()
                .collect(),
        };
        if self.query.timestamps && !update_columns.iter().any(|c| c == UPDATED_AT) {
            update_columns.push(UPDATED_AT.to_string());
        }

        let row_placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let values_clause = vec![row_placeholders.as_str(); rows.len()].join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({})",
            self.query.table,
            columns.join(", "),
            values_clause,
            self.unique_by.join(", ")
        );
        if update_columns.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            let assignments: Vec<String> = update_columns
                .iter()
                .map(|column| format!("{} = EXCLUDED.{}", column, column))
                .collect();
            sql.push_str(&format!(" DO UPDATE SET {}", assignments.join(", ")));
        }

        let bindings: Vec<Value> = rows
            .iter()
            .flat_map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            })
            .collect();

        Ok(Some((sql, bindings)))
    }

    /// Execute the upsert, returning the affected-row count.
    pub async fn execute(self, conn: &dyn Connection) -> ModelResult<u64> {
        let Some((sql, bindings)) = self.compile()? else {
            return Ok(0);
        };
        match run_statement(conn, &sql, &bindings).await {
            Ok(affected) => Ok(affected),
            Err(ModelError::Database(_)) if self.ignore_errors => Ok(0),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_unique_by_is_rejected() {
        let upsert = QueryBuilder::from_table("users")
            .upsert(vec![row(&[("email", json!("a@x"))])], vec![]);
        assert!(matches!(
            upsert.compile(),
            Err(ModelError::Validation(_))
        ));
    }

    #[test]
    fn update_set_defaults_to_non_unique_columns() {
        let upsert = QueryBuilder::from_table("users").upsert(
            vec![row(&[("email", json!("a@x")), ("name", json!("A"))])],
            vec!["email"],
        );
        let (sql, bindings) = upsert.compile().unwrap().unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (email, name) VALUES (?, ?) \
             ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name"
        );
        assert_eq!(bindings, vec![json!("a@x"), json!("A")]);
    }

    #[test]
    fn timestamped_upsert_always_updates_updated_at() {
        let upsert = QueryBuilder::from_table("users")
            .with_timestamps(true)
            .upsert(
                vec![row(&[("email", json!("a@x")), ("name", json!("A"))])],
                vec!["email"],
            )
            .update_only(vec!["name"]);
        let (sql, _) = upsert.compile().unwrap().unwrap();
        assert!(sql.contains("updated_at = EXCLUDED.updated_at"));
    }
}
