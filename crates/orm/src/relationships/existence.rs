//! Relationship existence filters
//!
//! `has` / `where_has` and friends filter parents by whether related rows
//! exist, compiled to a correlated `[NOT] EXISTS (SELECT 1 ... LIMIT 1)`
//! predicate. Caller constraints on the related rows are compiled with
//! bound parameters and carried on the entry, so they flow through the
//! same placeholder/binding pass as every other condition.

use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::query::builder::QueryBuilder;
use crate::query::types::{ConditionEntry, Connector};
use crate::relationships::metadata::{RelationKind, RelationshipMetadata};

impl QueryBuilder {
    /// Keep parents having at least one related row.
    pub fn has(self, relation: &str) -> ModelResult<Self> {
        self.existence_filter(relation, Connector::And, false, identity_constraint())
    }

    /// Keep parents having no related rows.
    pub fn doesnt_have(self, relation: &str) -> ModelResult<Self> {
        self.existence_filter(relation, Connector::And, true, identity_constraint())
    }

    /// Like [`has`](Self::has), joined with OR.
    pub fn or_has(self, relation: &str) -> ModelResult<Self> {
        self.existence_filter(relation, Connector::Or, false, identity_constraint())
    }

    /// Keep parents having at least one related row matching `constraint`.
    pub fn where_has<F>(self, relation: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.existence_filter(relation, Connector::And, false, constraint)
    }

    /// Keep parents having no related row matching `constraint`.
    pub fn where_doesnt_have<F>(self, relation: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.existence_filter(relation, Connector::And, true, constraint)
    }

    /// Like [`where_has`](Self::where_has), joined with OR.
    pub fn or_where_has<F>(self, relation: &str, constraint: F) -> ModelResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.existence_filter(relation, Connector::Or, false, constraint)
    }

    fn existence_filter<F>(
        mut self,
        relation: &str,
        connector: Connector,
        negated: bool,
        constraint: F,
    ) -> ModelResult<Self>
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let entity = self.entity.as_deref().ok_or_else(|| {
            ModelError::Relationship(
                "existence filters require a builder created for a registered entity".to_string(),
            )
        })?;
        let registry = self.registry.as_ref().ok_or_else(|| {
            ModelError::Relationship(
                "existence filters require a relationship registry".to_string(),
            )
        })?;
        let metadata = registry.get(entity, relation)?;

        let sub = constraint(QueryBuilder::from_table(&metadata.related_table));
        let (subquery, bindings) = self.existence_subquery(&metadata, &sub)?;

        self.conditions.push(ConditionEntry::Exists {
            connector,
            negated,
            subquery,
            bindings,
        });
        Ok(self)
    }

    /// Correlated `SELECT 1 ... LIMIT 1` text for one relation, plus the
    /// bound parameters of the caller's sub-constraints.
    fn existence_subquery(
        &self,
        metadata: &RelationshipMetadata,
        sub: &QueryBuilder,
    ) -> ModelResult<(String, Vec<Value>)> {
        let (constraints, bindings) = sub.compile_wheres();

        let mut sql = match metadata.kind {
            RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsTo => format!(
                "SELECT 1 FROM {related} WHERE {related}.{match_col} = {parent}.{parent_col}",
                related = metadata.related_table,
                match_col = metadata.related_match_column(),
                parent = self.table,
                parent_col = metadata.parent_key_column(),
            ),
            RelationKind::BelongsToMany => {
                let pivot = metadata.pivot.as_ref().ok_or_else(|| {
                    ModelError::Relationship(format!(
                        "relation '{}' is missing pivot metadata",
                        metadata.name
                    ))
                })?;
                format!(
                    "SELECT 1 FROM {related} INNER JOIN {pivot} ON {pivot}.{fk} = {related}.{related_key} WHERE {pivot}.{local} = {parent}.{parent_col}",
                    related = metadata.related_table,
                    pivot = pivot.table,
                    fk = pivot.foreign_key,
                    related_key = metadata.foreign_key,
                    local = pivot.local_key,
                    parent = self.table,
                    parent_col = metadata.parent_key_column(),
                )
            }
        };

        if !constraints.is_empty() {
            sql.push_str(" AND (");
            sql.push_str(&constraints);
            sql.push(')');
        }
        sql.push_str(" LIMIT 1");
        Ok((sql, bindings))
    }
}

fn identity_constraint() -> impl FnOnce(QueryBuilder) -> QueryBuilder {
    |query| query
}
