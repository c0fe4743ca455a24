//! Relationship Registry - shared catalogue of declared relationships
//!
//! Declarations are registered once per entity and looked up by name when
//! eager loads or existence filters resolve. The registry is cheap to
//! clone and safe to share across tasks.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{ModelError, ModelResult};
use crate::relationships::metadata::RelationshipMetadata;

/// Thread-safe registry mapping entity name -> relation name -> metadata
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    entries: Arc<DashMap<String, HashMap<String, RelationshipMetadata>>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one relationship declaration for an entity. Validates the
    /// metadata and replaces any earlier declaration with the same name.
    pub fn register(&self, entity: &str, metadata: RelationshipMetadata) -> ModelResult<()> {
        metadata.validate()?;
        self.entries
            .entry(entity.to_string())
            .or_default()
            .insert(metadata.name.clone(), metadata);
        Ok(())
    }

    /// Look up a declared relationship, failing with a clear error for
    /// names that were never registered.
    pub fn get(&self, entity: &str, relation: &str) -> ModelResult<RelationshipMetadata> {
        self.entries
            .get(entity)
            .and_then(|relations| relations.get(relation).cloned())
            .ok_or_else(|| {
                ModelError::Relationship(format!(
                    "relation '{}' is not declared on entity '{}'",
                    relation, entity
                ))
            })
    }

    /// All relation names declared for an entity
    pub fn relation_names(&self, entity: &str) -> Vec<String> {
        self.entries
            .get(entity)
            .map(|relations| relations.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has(&self, entity: &str, relation: &str) -> bool {
        self.entries
            .get(entity)
            .map(|relations| relations.contains_key(relation))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = RelationshipRegistry::new();
        registry
            .register(
                "User",
                RelationshipMetadata::has_many("posts", "posts", "Post", "user_id"),
            )
            .unwrap();

        let metadata = registry.get("User", "posts").unwrap();
        assert_eq!(metadata.related_table, "posts");
        assert!(registry.has("User", "posts"));
    }

    #[test]
    fn undeclared_relation_is_an_error() {
        let registry = RelationshipRegistry::new();
        let err = registry.get("User", "ghosts").unwrap_err();
        assert!(matches!(err, ModelError::Relationship(_)));
        assert!(err.to_string().contains("ghosts"));
    }

    #[test]
    fn re_registration_replaces() {
        let registry = RelationshipRegistry::new();
        registry
            .register(
                "User",
                RelationshipMetadata::has_many("posts", "posts", "Post", "user_id"),
            )
            .unwrap();
        registry
            .register(
                "User",
                RelationshipMetadata::has_many("posts", "articles", "Post", "author_id"),
            )
            .unwrap();

        let metadata = registry.get("User", "posts").unwrap();
        assert_eq!(metadata.related_table, "articles");
        assert_eq!(registry.relation_names("User").len(), 1);
    }
}
