//! Relationship system - declarations, batched eager loading, pivot
//! maintenance, and existence filters

pub mod eager_loading;
pub mod existence;
pub mod metadata;
pub mod pivot;
pub mod registry;

pub use eager_loading::{EagerLoader, PIVOT_PREFIX};
pub use metadata::{PivotConfig, RelationKind, RelationshipMetadata};
pub use pivot::SyncReport;
pub use registry::RelationshipRegistry;
