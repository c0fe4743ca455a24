//! Query Builder SELECT operations

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::SelectField;

impl QueryBuilder {
    /// Add SELECT fields to the query. Accepts a comma-separated list;
    /// an empty projection renders as `*`.
    pub fn select(mut self, fields: &str) -> Self {
        if fields == "*" {
            self.select_fields.push(SelectField::Column("*".to_string()));
        } else {
            self.select_fields.extend(
                fields
                    .split(',')
                    .map(|f| SelectField::Column(f.trim().to_string())),
            );
        }
        self
    }

    /// Add a raw SELECT expression carrying its own bindings.
    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.select_fields.push(SelectField::Raw {
            sql: sql.to_string(),
            bindings,
        });
        self
    }

    /// Add SELECT DISTINCT to the query
    pub fn select_distinct(mut self, fields: &str) -> Self {
        self.distinct = true;
        self.select(fields)
    }

    /// Add COUNT aggregate
    pub fn select_count(self, column: &str, alias: Option<&str>) -> Self {
        self.select_aggregate("COUNT", column, alias)
    }

    /// Add SUM aggregate
    pub fn select_sum(self, column: &str, alias: Option<&str>) -> Self {
        self.select_aggregate("SUM", column, alias)
    }

    /// Add AVG aggregate
    pub fn select_avg(self, column: &str, alias: Option<&str>) -> Self {
        self.select_aggregate("AVG", column, alias)
    }

    /// Add MIN aggregate
    pub fn select_min(self, column: &str, alias: Option<&str>) -> Self {
        self.select_aggregate("MIN", column, alias)
    }

    /// Add MAX aggregate
    pub fn select_max(self, column: &str, alias: Option<&str>) -> Self {
        self.select_aggregate("MAX", column, alias)
    }

    fn select_aggregate(mut self, function: &str, column: &str, alias: Option<&str>) -> Self {
        let expr = match alias {
            Some(alias) => format!("{}({}) AS {}", function, column, alias),
            None => format!("{}({})", function, column),
        };
        self.select_fields.push(SelectField::Column(expr));
        self
    }
}
