//! Query Builder Types - Core types and enums for query building
//!
//! The filter model is an ordered list of typed condition entries, each
//! tagged with the boolean connector (AND/OR) that joins it to the entry
//! before it. The SQL compiler walks this list once, emitting placeholder
//! and bound value together, so placeholder order and binding order cannot
//! diverge.

use std::fmt;

use serde_json::Value;

/// Boolean connector joining a condition entry to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connector::And => write!(f, "AND"),
            Connector::Or => write!(f, "OR"),
        }
    }
}

/// Comparison operators for plain conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl QueryOperator {
    /// Parse a SQL operator string. Unknown operators are not silently
    /// coerced; callers get `None` and must decide.
    pub fn parse(operator: &str) -> Option<Self> {
        match operator {
            "=" => Some(Self::Equal),
            "!=" | "<>" => Some(Self::NotEqual),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqual),
            "LIKE" | "like" => Some(Self::Like),
            "NOT LIKE" | "not like" => Some(Self::NotLike),
            _ => None,
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

/// One typed clause in a query's filter list.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionEntry {
    /// `column <op> ?` — exactly one bound parameter
    Compare {
        connector: Connector,
        column: String,
        operator: QueryOperator,
        value: Value,
    },
    /// `column IS [NOT] NULL` — no bound parameters
    Null {
        connector: Connector,
        column: String,
        negated: bool,
    },
    /// `column [NOT] BETWEEN ? AND ?` — exactly two bound parameters
    Between {
        connector: Connector,
        column: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    /// `column [NOT] IN (?, ...)` — one parameter per element; an empty
    /// list compiles to an always-false (or always-true) predicate
    In {
        connector: Connector,
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    /// Verbatim SQL fragment with its own declared bindings
    Raw {
        connector: Connector,
        sql: String,
        bindings: Vec<Value>,
    },
    /// `[NOT] EXISTS (subquery)` — correlated subquery text plus the bound
    /// parameters of any caller-supplied sub-constraints
    Exists {
        connector: Connector,
        negated: bool,
        subquery: String,
        bindings: Vec<Value>,
    },
}

impl ConditionEntry {
    /// The connector joining this entry to the previous one.
    pub fn connector(&self) -> Connector {
        match self {
            ConditionEntry::Compare { connector, .. }
            | ConditionEntry::Null { connector, .. }
            | ConditionEntry::Between { connector, .. }
            | ConditionEntry::In { connector, .. }
            | ConditionEntry::Raw { connector, .. }
            | ConditionEntry::Exists { connector, .. } => *connector,
        }
    }
}

/// Join kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
            JoinKind::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Join clause: `<KIND> JOIN <table> ON <left> <op> <right>`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub left: String,
    pub operator: String,
    pub right: String,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEntry {
    Column {
        column: String,
        direction: OrderDirection,
    },
    Raw {
        sql: String,
        bindings: Vec<Value>,
    },
}

/// One projected field
#[derive(Debug, Clone, PartialEq)]
pub enum SelectField {
    /// Plain column name or aggregate expression passed through verbatim
    Column(String),
    /// Raw expression carrying its own bindings
    Raw { sql: String, bindings: Vec<Value> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_round_trip() {
        for op in ["=", "!=", ">", ">=", "<", "<=", "LIKE", "NOT LIKE"] {
            let parsed = QueryOperator::parse(op).unwrap();
            assert_eq!(parsed.to_string(), op);
        }
        assert_eq!(QueryOperator::parse("<>"), Some(QueryOperator::NotEqual));
        assert_eq!(QueryOperator::parse("ILIKE"), None);
    }

    #[test]
    fn join_kind_rendering() {
        assert_eq!(JoinKind::Inner.to_string(), "INNER JOIN");
        assert_eq!(JoinKind::Left.to_string(), "LEFT JOIN");
        assert_eq!(JoinKind::Right.to_string(), "RIGHT JOIN");
    }
}
