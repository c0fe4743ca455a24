//! Query Builder ORDER BY and GROUP BY operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::{OrderDirection, OrderEntry};

impl QueryBuilder {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push(OrderEntry::Column {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        });
        self
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push(OrderEntry::Column {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        });
        self
    }

    /// Add a raw ORDER BY expression carrying its own bindings.
    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.order_by.push(OrderEntry::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    /// Drop any accumulated ordering, e.g. before a counting query.
    pub fn without_ordering(mut self) -> Self {
        self.order_by.clear();
        self
    }
}
