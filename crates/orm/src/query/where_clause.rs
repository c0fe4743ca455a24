//! Query Builder WHERE clause operations
//!
//! Every method appends one typed condition entry tagged with its connector.
//! The first entry's connector is ignored at render time.

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::{ConditionEntry, Connector, QueryOperator};

impl QueryBuilder {
    fn push_compare(
        mut self,
        connector: Connector,
        column: &str,
        operator: QueryOperator,
        value: Value,
    ) -> Self {
        self.conditions.push(ConditionEntry::Compare {
            connector,
            column: column.to_string(),
            operator,
            value,
        });
        self
    }

    /// Add an AND condition with an explicit operator.
    pub fn where_op<T: Into<Value>>(self, column: &str, operator: QueryOperator, value: T) -> Self {
        self.push_compare(Connector::And, column, operator, value.into())
    }

    /// Add an OR condition with an explicit operator.
    pub fn or_where_op<T: Into<Value>>(
        self,
        column: &str,
        operator: QueryOperator,
        value: T,
    ) -> Self {
        self.push_compare(Connector::Or, column, operator, value.into())
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::Equal, value)
    }

    /// Add OR WHERE condition with equality
    pub fn or_where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.or_where_op(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::NotEqual, value)
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThan, value)
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThanOrEqual, value)
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThan, value)
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, QueryOperator::Like, pattern)
    }

    /// Add WHERE condition with NOT LIKE
    pub fn where_not_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, QueryOperator::NotLike, pattern)
    }

    /// Add WHERE condition with IN. An empty value list compiles to an
    /// always-false predicate, so the query matches nothing.
    pub fn where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.conditions.push(ConditionEntry::In {
            connector: Connector::And,
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    /// Add WHERE condition with NOT IN. An empty value list compiles to an
    /// always-true predicate.
    pub fn where_not_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.conditions.push(ConditionEntry::In {
            connector: Connector::And,
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        });
        self
    }

    /// Add OR WHERE condition with IN
    pub fn or_where_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.conditions.push(ConditionEntry::In {
            connector: Connector::Or,
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        });
        self
    }

    /// Add WHERE condition with BETWEEN
    pub fn where_between<T: Into<Value>>(mut self, column: &str, low: T, high: T) -> Self {
        self.conditions.push(ConditionEntry::Between {
            connector: Connector::And,
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: false,
        });
        self
    }

    /// Add WHERE condition with NOT BETWEEN
    pub fn where_not_between<T: Into<Value>>(mut self, column: &str, low: T, high: T) -> Self {
        self.conditions.push(ConditionEntry::Between {
            connector: Connector::And,
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: true,
        });
        self
    }

    /// Add WHERE condition with IS NULL
    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions.push(ConditionEntry::Null {
            connector: Connector::And,
            column: column.to_string(),
            negated: false,
        });
        self
    }

    /// Add WHERE condition with IS NOT NULL
    pub fn where_not_null(mut self, column: &str) -> Self {
        self.conditions.push(ConditionEntry::Null {
            connector: Connector::And,
            column: column.to_string(),
            negated: true,
        });
        self
    }

    /// Add OR WHERE condition with IS NULL
    pub fn or_where_null(mut self, column: &str) -> Self {
        self.conditions.push(ConditionEntry::Null {
            connector: Connector::Or,
            column: column.to_string(),
            negated: false,
        });
        self
    }

    /// Add a raw WHERE fragment with its own bindings, joined with AND.
    pub fn where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.conditions.push(ConditionEntry::Raw {
            connector: Connector::And,
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Add a raw WHERE fragment with its own bindings, joined with OR.
    pub fn or_where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.conditions.push(ConditionEntry::Raw {
            connector: Connector::Or,
            sql: sql.to_string(),
            bindings,
        });
        self
    }
}
