//! Relationship Metadata - descriptors for declared relationships
//!
//! A descriptor carries everything a follow-up query needs: kind, related
//! table and entity, and the key mapping. Key-column meaning varies by
//! kind:
//!
//! - `HasOne` / `HasMany`: `foreign_key` is the column on the related
//!   table, `local_key` the key column on the parent (default `id`).
//! - `BelongsTo`: `foreign_key` is the column on the parent holding the
//!   reference, `local_key` the owner key on the related table.
//! - `BelongsToMany`: keys live on the pivot (`PivotConfig`); `local_key`
//!   is the parent key column and `foreign_key` the related table's
//!   primary key, both defaulting to `id`.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::Record;
use crate::query::builder::QueryBuilder;

/// Defines the kind of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// One-to-one relationship
    HasOne,
    /// Inverse one-to-one / many-to-one relationship
    BelongsTo,
    /// One-to-many relationship
    HasMany,
    /// Many-to-many relationship through a pivot table
    BelongsToMany,
}

impl RelationKind {
    /// Returns true if this relationship resolves to a sub-collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// Pivot table configuration for many-to-many relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotConfig {
    /// The pivot table name
    pub table: String,
    /// Pivot column referencing the parent
    pub local_key: String,
    /// Pivot column referencing the related entity
    pub foreign_key: String,
    /// Additional pivot columns to project into the pivot record
    pub columns: Vec<String>,
}

impl PivotConfig {
    pub fn new(table: &str, local_key: &str, foreign_key: &str) -> Self {
        Self {
            table: table.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns(mut self, columns: Vec<&str>) -> Self {
        self.columns = columns.into_iter().map(str::to_string).collect();
        self
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.table.is_empty() || self.local_key.is_empty() || self.foreign_key.is_empty() {
            return Err(ModelError::Configuration(
                "pivot configuration requires a table and both key columns".to_string(),
            ));
        }
        if self.local_key == self.foreign_key {
            return Err(ModelError::Configuration(
                "pivot local key and foreign key must be different".to_string(),
            ));
        }
        Ok(())
    }
}

/// One declared relationship: kind, target, and key mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub kind: RelationKind,
    /// Relationship name as used in eager-load paths and filters
    pub name: String,
    pub related_table: String,
    /// The related entity's registry name, for nested path resolution
    pub related_entity: String,
    pub foreign_key: String,
    pub local_key: String,
    pub pivot: Option<PivotConfig>,
}

impl RelationshipMetadata {
    pub fn has_one(name: &str, related_table: &str, related_entity: &str, foreign_key: &str) -> Self {
        Self::keyed(RelationKind::HasOne, name, related_table, related_entity, foreign_key, "id")
    }

    pub fn has_many(
        name: &str,
        related_table: &str,
        related_entity: &str,
        foreign_key: &str,
    ) -> Self {
        Self::keyed(RelationKind::HasMany, name, related_table, related_entity, foreign_key, "id")
    }

    pub fn belongs_to(
        name: &str,
        related_table: &str,
        related_entity: &str,
        foreign_key: &str,
    ) -> Self {
        Self::keyed(RelationKind::BelongsTo, name, related_table, related_entity, foreign_key, "id")
    }

    pub fn belongs_to_many(
        name: &str,
        related_table: &str,
        related_entity: &str,
        pivot: PivotConfig,
    ) -> Self {
        let mut metadata = Self::keyed(
            RelationKind::BelongsToMany,
            name,
            related_table,
            related_entity,
            "id",
            "id",
        );
        metadata.pivot = Some(pivot);
        metadata
    }

    fn keyed(
        kind: RelationKind,
        name: &str,
        related_table: &str,
        related_entity: &str,
        foreign_key: &str,
        local_key: &str,
    ) -> Self {
        Self {
            kind,
            name: name.to_string(),
            related_table: related_table.to_string(),
            related_entity: related_entity.to_string(),
            foreign_key: foreign_key.to_string(),
            local_key: local_key.to_string(),
            pivot: None,
        }
    }

    /// Override the parent-side key column
    pub fn with_local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    /// Override the related-side key column
    pub fn with_foreign_key(mut self, foreign_key: &str) -> Self {
        self.foreign_key = foreign_key.to_string();
        self
    }

    /// Validate the metadata for consistency
    pub fn validate(&self) -> ModelResult<()> {
        if self.kind.requires_pivot() {
            match &self.pivot {
                Some(pivot) => pivot.validate()?,
                None => {
                    return Err(ModelError::Configuration(format!(
                        "relationship '{}' of kind {:?} requires pivot configuration",
                        self.name, self.kind
                    )))
                }
            }
        }
        if self.foreign_key.is_empty() || self.local_key.is_empty() {
            return Err(ModelError::Configuration(format!(
                "relationship '{}' requires both key columns",
                self.name
            )));
        }
        Ok(())
    }

    /// Column read off each parent record to collect batch keys.
    pub fn parent_key_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo => &self.foreign_key,
            _ => &self.local_key,
        }
    }

    /// Column on the fetched related rows that matches the parent keys.
    pub fn related_match_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo => &self.local_key,
            _ => &self.foreign_key,
        }
    }

    /// A builder scoped to the related rows of one parent record: the
    /// declaration call returns the descriptor and this pre-filtered query
    /// together, so there is no transient per-instance slot to consume.
    pub fn query_for(&self, parent: &Record) -> ModelResult<QueryBuilder> {
        let key_column = self.parent_key_column();
        let key = parent.get(key_column).cloned().ok_or_else(|| {
            ModelError::MissingPrimaryKey(format!(
                "record has no value for key column '{}' required by relation '{}'",
                key_column, self.name
            ))
        })?;

        match self.kind {
            RelationKind::HasOne | RelationKind::HasMany | RelationKind::BelongsTo => {
                Ok(QueryBuilder::from_table(&self.related_table)
                    .where_eq(self.related_match_column(), key))
            }
            RelationKind::BelongsToMany => {
                let pivot = self.pivot.as_ref().ok_or_else(|| {
                    ModelError::Relationship(format!(
                        "relation '{}' is missing pivot metadata",
                        self.name
                    ))
                })?;
                Ok(QueryBuilder::from_table(&self.related_table)
                    .select(&format!("{}.*", self.related_table))
                    .join(
                        &pivot.table,
                        &format!("{}.{}", pivot.table, pivot.foreign_key),
                        "=",
                        &format!("{}.{}", self.related_table, self.foreign_key),
                    )
                    .where_eq(&format!("{}.{}", pivot.table, pivot.local_key), key))
            }
        }
    }
}
