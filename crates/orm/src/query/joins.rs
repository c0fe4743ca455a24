//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::{JoinClause, JoinKind};

impl QueryBuilder {
    fn push_join(mut self, kind: JoinKind, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.joins.push(JoinClause {
            kind,
            table: table.to_string(),
            left: left.to_string(),
            operator: op.to_string(),
            right: right.to_string(),
        });
        self
    }

    /// Add INNER JOIN to the query
    pub fn join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinKind::Inner, table, left, op, right)
    }

    /// Add LEFT JOIN to the query
    pub fn left_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinKind::Left, table, left, op, right)
    }

    /// Add RIGHT JOIN to the query
    pub fn right_join(self, table: &str, left: &str, op: &str, right: &str) -> Self {
        self.push_join(JoinKind::Right, table, left, op, right)
    }
}
