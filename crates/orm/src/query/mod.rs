//! Query builder module - fluent SQL query construction and execution
//!
//! The builder itself lives in `builder`; the fluent surface is split
//! across one file per concern, each extending `QueryBuilder` with its
//! own `impl` block.

pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod upsert;
pub mod where_clause;
pub mod with;

pub use builder::{is_present, QueryBuilder};
pub use execution::RecordStream;
pub use pagination::Paginator;
pub use types::{
    ConditionEntry, Connector, JoinClause, JoinKind, OrderDirection, OrderEntry, QueryOperator,
    SelectField,
};
pub use upsert::UpsertBuilder;
pub use with::{ConstraintFn, EagerLoadSpec};
