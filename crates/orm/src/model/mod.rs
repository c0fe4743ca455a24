//! Model System - dynamic records materialized from result rows

pub mod record;

pub use record::{Record, Related};
