//! Database Backend Abstraction - trait seam for the connection collaborator

pub mod core;

pub use core::{bind_values, BindValue, Connection, SqlRow, Statement};
