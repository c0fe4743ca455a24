//! Query Builder eager-loading requests
//!
//! `with` and friends only record requests on the builder; resolution
//! happens after the primary rows are materialized, one batched query per
//! relation level, in `relationships::eager_loading`.

use std::fmt;
use std::sync::Arc;

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::Record;
use crate::relationships::eager_loading::EagerLoader;

use super::builder::QueryBuilder;

/// Caller-supplied constraint applied to a relation's batched query.
pub type ConstraintFn = Arc<dyn Fn(QueryBuilder) -> QueryBuilder + Send + Sync>;

/// One requested relation path, with an optional constraint.
#[derive(Clone)]
pub struct EagerLoadSpec {
    pub relation: String,
    pub constraint: Option<ConstraintFn>,
}

impl fmt::Debug for EagerLoadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoadSpec")
            .field("relation", &self.relation)
            .field("constraint", &self.constraint.is_some())
            .finish()
    }
}

impl QueryBuilder {
    /// Request a relation (or dotted relation path) to be eagerly loaded.
    pub fn with(mut self, relation: &str) -> Self {
        self.eager_loads.push(EagerLoadSpec {
            relation: relation.to_string(),
            constraint: None,
        });
        self
    }

    /// Request a relation only when `condition` holds.
    pub fn with_when(self, condition: bool, relation: &str) -> Self {
        if condition {
            self.with(relation)
        } else {
            self
        }
    }

    /// Request a relation with a constraint applied to its batched query.
    /// For dotted paths the constraint applies to the final segment.
    pub fn with_constraint<F>(mut self, relation: &str, constraint: F) -> Self
    where
        F: Fn(QueryBuilder) -> QueryBuilder + Send + Sync + 'static,
    {
        self.eager_loads.push(EagerLoadSpec {
            relation: relation.to_string(),
            constraint: Some(Arc::new(constraint)),
        });
        self
    }

    /// Resolve all requested relation paths against a materialized batch.
    pub(crate) async fn apply_eager_loads(
        &self,
        conn: &dyn Connection,
        records: &mut [Record],
    ) -> ModelResult<()> {
        if self.eager_loads.is_empty() || records.is_empty() {
            return Ok(());
        }
        let entity = self.entity.as_deref().ok_or_else(|| {
            ModelError::Relationship(
                "eager loading requires a builder created for a registered entity".to_string(),
            )
        })?;
        let registry = self.registry.clone().ok_or_else(|| {
            ModelError::Relationship(
                "eager loading requires a relationship registry".to_string(),
            )
        })?;

        let loader = EagerLoader::new(registry);
        for spec in &self.eager_loads {
            loader
                .load(
                    conn,
                    entity,
                    records,
                    &spec.relation,
                    spec.constraint.as_ref(),
                )
                .await?;
        }
        Ok(())
    }
}
