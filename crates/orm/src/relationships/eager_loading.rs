//! Batched eager loading
//!
//! Resolves each requested relation level with one query for the whole
//! parent batch: collect the parent keys, fetch every related row whose
//! match column is in that set, then group the rows back onto their
//! parents in memory. Dotted paths recurse level by level, so a path of
//! depth N costs N queries regardless of batch size.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::{Record, Related};
use crate::query::builder::QueryBuilder;
use crate::query::with::ConstraintFn;
use crate::relationships::metadata::{RelationKind, RelationshipMetadata};
use crate::relationships::registry::RelationshipRegistry;

/// Alias prefix for pivot columns projected alongside related rows, so
/// they can be peeled off into the pivot record after fetching.
pub const PIVOT_PREFIX: &str = "__pivot_";

/// Resolves relation paths against already-materialized record batches.
pub struct EagerLoader {
    registry: Arc<RelationshipRegistry>,
}

impl EagerLoader {
    pub fn new(registry: Arc<RelationshipRegistry>) -> Self {
        Self { registry }
    }

    /// Load one relation path (possibly dotted) onto a batch of records.
    /// The constraint, if any, applies to the final path segment only.
    pub async fn load(
        &self,
        conn: &dyn Connection,
        entity: &str,
        records: &mut [Record],
        path: &str,
        constraint: Option<&ConstraintFn>,
    ) -> ModelResult<()> {
        self.load_path(conn, entity, records, path, constraint).await
    }

    fn load_path<'a>(
        &'a self,
        conn: &'a dyn Connection,
        entity: &'a str,
        records: &'a mut [Record],
        path: &'a str,
        constraint: Option<&'a ConstraintFn>,
    ) -> Pin<Box<dyn Future<Output = ModelResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let (head, tail) = match path.split_once('.') {
                Some((head, tail)) => (head, Some(tail)),
                None => (path, None),
            };
            if head.is_empty() {
                return Err(ModelError::Relationship(format!(
                    "invalid relation path '{}'",
                    path
                )));
            }

            let metadata = self.registry.get(entity, head)?;
            let head_constraint = if tail.is_none() { constraint } else { None };
            let mut related = self
                .fetch_related(conn, records, &metadata, head_constraint)
                .await?;

            if let Some(tail) = tail {
                self.load_path(conn, &metadata.related_entity, &mut related, tail, constraint)
                    .await?;
            }

            attach(records, &metadata, related);
            Ok(())
        })
    }

    /// One batched fetch for a relation level. Returns the related rows
    /// with pivot columns (if any) already peeled off.
    async fn fetch_related(
        &self,
        conn: &dyn Connection,
        records: &[Record],
        metadata: &RelationshipMetadata,
        constraint: Option<&ConstraintFn>,
    ) -> ModelResult<Vec<Record>> {
        let keys = collect_keys(records, metadata.parent_key_column());
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = self.relation_query(metadata, keys)?;
        if let Some(constraint) = constraint {
            query = constraint(query);
        }

        let mut related = query.get(conn).await?;
        if metadata.kind == RelationKind::BelongsToMany {
            for record in &mut related {
                strip_pivot(record);
            }
        }
        Ok(related)
    }

    fn relation_query(
        &self,
        metadata: &RelationshipMetadata,
        keys: Vec<Value>,
    ) -> ModelResult<QueryBuilder> {
        let base = QueryBuilder::for_entity(
            &metadata.related_entity,
            &metadata.related_table,
            Arc::clone(&self.registry),
        );
        match metadata.kind {
            RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsTo => {
                Ok(base.where_in(metadata.related_match_column(), keys))
            }
            RelationKind::BelongsToMany => {
                let pivot = metadata.pivot.as_ref().ok_or_else(|| {
                    ModelError::Relationship(format!(
                        "relation '{}' is missing pivot metadata",
                        metadata.name
                    ))
                })?;
                let mut projection = vec![
                    format!("{}.*", metadata.related_table),
                    format!(
                        "{}.{} AS {}{}",
                        pivot.table, pivot.local_key, PIVOT_PREFIX, pivot.local_key
                    ),
                    format!(
                        "{}.{} AS {}{}",
                        pivot.table, pivot.foreign_key, PIVOT_PREFIX, pivot.foreign_key
                    ),
                ];
                for column in &pivot.columns {
                    projection.push(format!(
                        "{}.{} AS {}{}",
                        pivot.table, column, PIVOT_PREFIX, column
                    ));
                }
                Ok(base
                    .select(&projection.join(", "))
                    .join(
                        &pivot.table,
                        &format!("{}.{}", pivot.table, pivot.foreign_key),
                        "=",
                        &format!("{}.{}", metadata.related_table, metadata.foreign_key),
                    )
                    .where_in(&format!("{}.{}", pivot.table, pivot.local_key), keys))
            }
        }
    }
}

/// Distinct, order-preserving key values read off a batch of records.
/// Nulls and missing columns contribute nothing.
fn collect_keys(records: &[Record], column: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for record in records {
        let value = match record.get(column) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };
        if let Some(key) = key_of(value) {
            if seen.insert(key) {
                keys.push(value.clone());
            }
        }
    }
    keys
}

/// Canonical grouping key for a scalar value. Numbers and strings that
/// print the same group together; null never groups.
pub(crate) fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Move `__pivot_`-prefixed attributes off a fetched row into its pivot
/// record, leaving the row's own columns untouched.
fn strip_pivot(record: &mut Record) {
    let pivot_columns: Vec<String> = record
        .attributes()
        .keys()
        .filter(|name| name.starts_with(PIVOT_PREFIX))
        .cloned()
        .collect();
    let mut pivot = HashMap::new();
    for name in pivot_columns {
        if let Some(value) = record.take(&name) {
            pivot.insert(name[PIVOT_PREFIX.len()..].to_string(), value);
        }
    }
    record.set_pivot(pivot);
}

/// Group related rows by their match key and attach each group to its
/// parent. Parents with no match still get an explicit empty relation so
/// later code can tell "loaded, empty" from "never loaded".
fn attach(records: &mut [Record], metadata: &RelationshipMetadata, related: Vec<Record>) {
    let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
    for row in related {
        let key = match metadata.kind {
            RelationKind::BelongsToMany => row
                .pivot()
                .and_then(|pivot| pivot.get(metadata.pivot.as_ref().map(|p| p.local_key.as_str()).unwrap_or("")))
                .and_then(key_of),
            _ => row.get(metadata.related_match_column()).and_then(key_of),
        };
        if let Some(key) = key {
            groups.entry(key).or_default().push(row);
        }
    }

    for record in records.iter_mut() {
        let matched = record
            .get(metadata.parent_key_column())
            .and_then(key_of)
            .and_then(|key| groups.get(&key).cloned())
            .unwrap_or_default();

        let related = if metadata.kind.is_collection() {
            Related::Many(matched)
        } else {
            Related::One(matched.into_iter().next().map(Box::new))
        };
        record.set_relation(&metadata.name, related);
    }
}
