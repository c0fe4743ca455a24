//! # ferrite-orm: Fluent query builder and lightweight ORM
//!
//! A data-access layer built around a fluent `QueryBuilder`: single-pass
//! SQL generation with aligned positional bindings, record materialization
//! over a pluggable backend trait, declared relationships with batched
//! eager loading, pivot maintenance for many-to-many links, and
//! relationship existence filters.

pub mod backends;
pub mod error;
pub mod model;
pub mod query;
pub mod relationships;

#[cfg(test)]
mod tests;

// Re-export core traits and types
pub use backends::*;
pub use error::*;
pub use model::*;
pub use query::*;
pub use relationships::*;
