//! Query Builder execution - terminal operations over a connection
//!
//! All reads and writes funnel through two helpers, `run_query` and
//! `run_statement`, so the prepare/bind/execute/release discipline and the
//! tracing at the execution boundary live in exactly one place. The lazy
//! path hands the caller an owning [`RecordStream`]; dropping it releases
//! the statement no matter how iteration ended.

use serde_json::Value;

use crate::backends::{bind_values, Connection, SqlRow, Statement};
use crate::error::{ModelError, ModelResult};
use crate::model::Record;

use super::builder::QueryBuilder;
use super::types::SelectField;

/// Run a row-returning statement to completion.
pub(crate) async fn run_query(
    conn: &dyn Connection,
    sql: &str,
    bindings: &[Value],
) -> ModelResult<Vec<SqlRow>> {
    tracing::debug!(sql = %sql, bindings = bindings.len(), "executing query");
    let mut statement = conn.prepare(sql).await?;
    bind_values(statement.as_mut(), bindings)?;
    statement.execute().await?;

    let mut rows = Vec::new();
    while let Some(row) = statement.fetch_row().await? {
        rows.push(row);
    }
    Ok(rows)
}

/// Run a write statement, returning the affected-row count.
pub(crate) async fn run_statement(
    conn: &dyn Connection,
    sql: &str,
    bindings: &[Value],
) -> ModelResult<u64> {
    tracing::debug!(sql = %sql, bindings = bindings.len(), "executing statement");
    let mut statement = conn.prepare(sql).await?;
    bind_values(statement.as_mut(), bindings)?;
    statement.execute().await?;
    Ok(statement.row_count())
}

/// Forward-only sequence of records mapped lazily from an executed
/// statement. Restartable per call, not resumable across calls; the
/// underlying statement is released when the stream is dropped.
pub struct RecordStream {
    statement: Box<dyn Statement>,
    finished: bool,
}

impl RecordStream {
    /// Fetch and map the next record, or `None` at end of results.
    pub async fn next(&mut self) -> ModelResult<Option<Record>> {
        if self.finished {
            return Ok(None);
        }
        match self.statement.fetch_row().await? {
            Some(row) => Ok(Some(Record::from_row(row))),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}

impl QueryBuilder {
    /// Expand a star projection through schema introspection when a GROUP BY
    /// is present, so the group-safety rewrite can see real column names.
    /// Done here, before generation, to keep the generator pure.
    async fn expanded_for_grouping(mut self, conn: &dyn Connection) -> ModelResult<Self> {
        if self.group_by.is_empty() {
            return Ok(self);
        }
        let is_star =
            |f: &SelectField| matches!(f, SelectField::Column(column) if column == "*");
        if !self.select_fields.is_empty() && !self.select_fields.iter().any(is_star) {
            return Ok(self);
        }
        let columns = conn.columns_of(&self.table).await?;
        let expanded: Vec<SelectField> = columns.into_iter().map(SelectField::Column).collect();
        if self.select_fields.is_empty() {
            self.select_fields = expanded;
        } else {
            let mut fields = Vec::new();
            for field in self.select_fields.drain(..) {
                if is_star(&field) {
                    fields.extend(expanded.iter().cloned());
                } else {
                    fields.push(field);
                }
            }
            self.select_fields = fields;
        }
        Ok(self)
    }

    /// Execute the query and materialize all rows, then resolve any
    /// requested eager loads against the materialized set.
    pub async fn get(self, conn: &dyn Connection) -> ModelResult<Vec<Record>> {
        let query = self.expanded_for_grouping(conn).await?;
        let (sql, bindings) = query.to_sql_with_bindings();
        let rows = run_query(conn, &sql, &bindings).await?;
        let mut records: Vec<Record> = rows.into_iter().map(Record::from_row).collect();
        query.apply_eager_loads(conn, &mut records).await?;
        Ok(records)
    }

    /// Execute lazily. Eager-load requests are not applied on this path;
    /// each record is yielded as it is fetched.
    pub async fn stream(self, conn: &dyn Connection) -> ModelResult<RecordStream> {
        let query = self.expanded_for_grouping(conn).await?;
        let (sql, bindings) = query.to_sql_with_bindings();
        tracing::debug!(sql = %sql, bindings = bindings.len(), "executing streamed query");
        let mut statement = conn.prepare(&sql).await?;
        bind_values(statement.as_mut(), &bindings)?;
        statement.execute().await?;
        Ok(RecordStream {
            statement,
            finished: false,
        })
    }

    /// Execute and return the first record, if any.
    pub async fn first(self, conn: &dyn Connection) -> ModelResult<Option<Record>> {
        let mut records = self.limit(1).get(conn).await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    /// Execute and return the first record, or a not-found error naming the
    /// table.
    pub async fn first_or_fail(self, conn: &dyn Connection) -> ModelResult<Record> {
        let table = self.table.clone();
        self.first(conn)
            .await?
            .ok_or(ModelError::NotFound(table))
    }

    /// Count matching rows. Works on a stripped copy of the query state:
    /// ordering, limit, and offset do not affect the count.
    pub async fn count(mut self, conn: &dyn Connection) -> ModelResult<i64> {
        self.order_by.clear();
        self.limit_count = None;
        self.offset_value = None;
        self.eager_loads.clear();
        self.select_fields = vec![SelectField::Column("COUNT(*) AS aggregate".to_string())];

        let (sql, bindings) = self.to_sql_with_bindings();
        let rows = run_query(conn, &sql, &bindings).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("aggregate"))
            .and_then(Value::as_i64)
            .ok_or_else(|| ModelError::Database("count query returned no aggregate".to_string()))?;
        Ok(count)
    }

    /// Whether any row matches.
    pub async fn exists(mut self, conn: &dyn Connection) -> ModelResult<bool> {
        self.select_fields = vec![SelectField::Raw {
            sql: "1 AS present".to_string(),
            bindings: Vec::new(),
        }];
        self.order_by.clear();
        self.eager_loads.clear();
        let (sql, bindings) = self.limit(1).to_sql_with_bindings();
        let rows = run_query(conn, &sql, &bindings).await?;
        Ok(!rows.is_empty())
    }

    /// Collect a single column across all matching rows.
    pub async fn pluck(self, conn: &dyn Connection, column: &str) -> ModelResult<Vec<Value>> {
        let records = self.get(conn).await?;
        Ok(records
            .into_iter()
            .map(|record| record.get(column).cloned().unwrap_or(Value::Null))
            .collect())
    }

    /// A single column of the first matching row.
    pub async fn value(self, conn: &dyn Connection, column: &str) -> ModelResult<Option<Value>> {
        Ok(self
            .first(conn)
            .await?
            .and_then(|record| record.get(column).cloned()))
    }
}
