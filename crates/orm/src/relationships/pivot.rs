//! Pivot table maintenance for many-to-many relationships
//!
//! attach / detach / sync operate directly on the pivot table. None of
//! them opens a transaction; callers that need atomicity wrap the call
//! in their own. `sync` issues the detach before the attach so a row
//! leaving and re-entering the desired set in one call nets out cleanly.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::Record;
use crate::query::builder::QueryBuilder;
use crate::relationships::eager_loading::key_of;
use crate::relationships::metadata::{PivotConfig, RelationshipMetadata};

/// Outcome of a [`RelationshipMetadata::sync`] call, partitioning the
/// desired set against what was already attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
    pub unchanged: Vec<Value>,
}

impl RelationshipMetadata {
    /// Link the given related ids to `parent`, writing one pivot row each.
    pub async fn attach(
        &self,
        conn: &dyn Connection,
        parent: &Record,
        related_ids: Vec<Value>,
    ) -> ModelResult<u64> {
        self.attach_with(conn, parent, related_ids, HashMap::new()).await
    }

    /// Link related ids with extra pivot columns applied to every row.
    pub async fn attach_with(
        &self,
        conn: &dyn Connection,
        parent: &Record,
        related_ids: Vec<Value>,
        extra: HashMap<String, Value>,
    ) -> ModelResult<u64> {
        let (pivot, parent_key) = self.pivot_context(parent)?;
        if related_ids.is_empty() {
            return Ok(0);
        }

        let rows: Vec<HashMap<String, Value>> = related_ids
            .into_iter()
            .map(|id| {
                let mut row = extra.clone();
                row.insert(pivot.local_key.clone(), parent_key.clone());
                row.insert(pivot.foreign_key.clone(), id);
                row
            })
            .collect();

        QueryBuilder::from_table(&pivot.table)
            .insert_many(conn, rows)
            .await
    }

    /// Unlink related ids from `parent`. Passing `None` unlinks all of
    /// them. Returns the number of pivot rows removed.
    pub async fn detach(
        &self,
        conn: &dyn Connection,
        parent: &Record,
        related_ids: Option<Vec<Value>>,
    ) -> ModelResult<u64> {
        let (pivot, parent_key) = self.pivot_context(parent)?;

        let mut query =
            QueryBuilder::from_table(&pivot.table).where_eq(&pivot.local_key, parent_key);
        match related_ids {
            Some(ids) if ids.is_empty() => return Ok(0),
            Some(ids) => query = query.where_in(&pivot.foreign_key, ids),
            None => {}
        }
        query.delete(conn).await
    }

    /// Reconcile the pivot rows for `parent` to exactly `desired_ids`:
    /// detach what is no longer wanted, attach what is missing, leave the
    /// overlap untouched.
    pub async fn sync(
        &self,
        conn: &dyn Connection,
        parent: &Record,
        desired_ids: Vec<Value>,
    ) -> ModelResult<SyncReport> {
        let (pivot, parent_key) = self.pivot_context(parent)?;

        let current = QueryBuilder::from_table(&pivot.table)
            .where_eq(&pivot.local_key, parent_key)
            .pluck(conn, &pivot.foreign_key)
            .await?;
        let current_keys: HashSet<String> = current.iter().filter_map(key_of).collect();

        let mut desired_keys = HashSet::new();
        let mut deduped = Vec::new();
        for id in desired_ids {
            if let Some(key) = key_of(&id) {
                if desired_keys.insert(key) {
                    deduped.push(id);
                }
            }
        }

        let mut report = SyncReport::default();
        for id in deduped {
            if current_keys.contains(&key_of(&id).unwrap_or_default()) {
                report.unchanged.push(id);
            } else {
                report.attached.push(id);
            }
        }
        for id in current {
            if let Some(key) = key_of(&id) {
                if !desired_keys.contains(&key) {
                    report.detached.push(id);
                }
            }
        }

        if !report.detached.is_empty() {
            self.detach(conn, parent, Some(report.detached.clone())).await?;
        }
        if !report.attached.is_empty() {
            self.attach(conn, parent, report.attached.clone()).await?;
        }
        Ok(report)
    }

    fn pivot_context<'a>(&'a self, parent: &Record) -> ModelResult<(&'a PivotConfig, Value)> {
        let pivot = self.pivot.as_ref().ok_or_else(|| {
            ModelError::Relationship(format!(
                "relation '{}' has no pivot table; attach/detach/sync apply to many-to-many relations only",
                self.name
            ))
        })?;
        let parent_key = parent
            .get(self.parent_key_column())
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| {
                ModelError::MissingPrimaryKey(format!(
                    "record has no value for key column '{}' required by relation '{}'",
                    self.parent_key_column(),
                    self.name
                ))
            })?;
        Ok((pivot, parent_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roles_relation() -> RelationshipMetadata {
        RelationshipMetadata::belongs_to_many(
            "roles",
            "roles",
            "Role",
            PivotConfig::new("user_roles", "user_id", "role_id"),
        )
    }

    #[tokio::test]
    async fn attach_on_non_pivot_relation_fails() {
        let metadata = RelationshipMetadata::has_many("posts", "posts", "Post", "user_id");
        let parent = Record::from_attributes(
            [("id".to_string(), json!(1))].into_iter().collect(),
        );
        let conn = crate::tests::MockConnection::new();
        let err = metadata.attach(&conn, &parent, vec![json!(2)]).await.unwrap_err();
        assert!(matches!(err, ModelError::Relationship(_)));
    }

    #[tokio::test]
    async fn attach_requires_parent_key() {
        let metadata = roles_relation();
        let parent = Record::from_attributes(Default::default());
        let conn = crate::tests::MockConnection::new();
        let err = metadata.attach(&conn, &parent, vec![json!(2)]).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingPrimaryKey(_)));
    }
}
