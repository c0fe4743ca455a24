//! Query Builder SQL generation
//!
//! One left-to-right pass over the builder state produces the SQL text and
//! the positional binding list together. A placeholder is never emitted
//! without its value being pushed in the same step, so the binding list is
//! aligned with the `?` placeholders by construction — there is no separate
//! binder walk to keep in sync.
//!
//! Generation is pure: compiling an unmodified builder twice yields
//! byte-identical text and bindings.

use serde_json::Value;

use super::builder::QueryBuilder;
use super::types::{ConditionEntry, OrderEntry, SelectField};

impl QueryBuilder {
    /// Generated SQL text for this query.
    pub fn to_sql(&self) -> String {
        self.to_sql_with_bindings().0
    }

    /// Generated SQL text plus the positional binding list, in placeholder
    /// order.
    pub fn to_sql_with_bindings(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut bindings = Vec::new();

        if self.distinct {
            sql.push_str("SELECT DISTINCT ");
        } else {
            sql.push_str("SELECT ");
        }
        self.compile_projection(&mut sql, &mut bindings);

        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.kind.to_string());
            sql.push(' ');
            sql.push_str(&join.table);
            sql.push_str(" ON ");
            sql.push_str(&join.left);
            sql.push(' ');
            sql.push_str(&join.operator);
            sql.push(' ');
            sql.push_str(&join.right);
        }

        self.compile_wheres_into(&mut sql, &mut bindings);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, entry) in self.order_by.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                match entry {
                    OrderEntry::Column { column, direction } => {
                        sql.push_str(column);
                        sql.push(' ');
                        sql.push_str(&direction.to_string());
                    }
                    OrderEntry::Raw {
                        sql: raw,
                        bindings: raw_bindings,
                    } => {
                        sql.push_str(raw);
                        bindings.extend(raw_bindings.iter().cloned());
                    }
                }
            }
        }

        // A negative limit means "no limit"; zero is a legal LIMIT 0.
        if let Some(limit) = self.limit_count {
            if limit >= 0 {
                sql.push_str(&format!(" LIMIT {}", limit));
            }
        }
        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, bindings)
    }

    /// Render the projection. Under a GROUP BY, any projected plain column
    /// that is neither in the group list nor an expression (no opening
    /// parenthesis) is rewritten as `MAX(col) AS col` so the statement
    /// survives strict-mode grouping rules. The rewrite picks an arbitrary
    /// representative per group; that is the documented, historical
    /// behavior and is replicated as-is.
    fn compile_projection(&self, sql: &mut String, bindings: &mut Vec<Value>) {
        if self.select_fields.is_empty() {
            sql.push('*');
            return;
        }

        for (i, field) in self.select_fields.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match field {
                SelectField::Column(column) => {
                    if !self.group_by.is_empty()
                        && !self.group_by.contains(column)
                        && !column.contains('(')
                        && column != "*"
                    {
                        sql.push_str(&format!("MAX({}) AS {}", column, column));
                    } else {
                        sql.push_str(column);
                    }
                }
                SelectField::Raw {
                    sql: raw,
                    bindings: raw_bindings,
                } => {
                    sql.push_str(raw);
                    bindings.extend(raw_bindings.iter().cloned());
                }
            }
        }
    }

    /// Append ` WHERE ...` for the condition list, if any.
    pub(crate) fn compile_wheres_into(&self, sql: &mut String, bindings: &mut Vec<Value>) {
        if self.conditions.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        let (clause, clause_bindings) = self.compile_wheres();
        sql.push_str(&clause);
        bindings.extend(clause_bindings);
    }

    /// Render the condition list without the `WHERE` keyword. Also used to
    /// embed a sub-builder's constraints inside an existence subquery.
    pub(crate) fn compile_wheres(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut bindings = Vec::new();

        for (i, entry) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(&entry.connector().to_string());
                sql.push(' ');
            }
            match entry {
                ConditionEntry::Compare {
                    column,
                    operator,
                    value,
                    ..
                } => {
                    sql.push_str(&format!("{} {} ?", column, operator));
                    bindings.push(value.clone());
                }
                ConditionEntry::Null {
                    column, negated, ..
                } => {
                    if *negated {
                        sql.push_str(&format!("{} IS NOT NULL", column));
                    } else {
                        sql.push_str(&format!("{} IS NULL", column));
                    }
                }
                ConditionEntry::Between {
                    column,
                    low,
                    high,
                    negated,
                    ..
                } => {
                    let keyword = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                    sql.push_str(&format!("{} {} ? AND ?", column, keyword));
                    bindings.push(low.clone());
                    bindings.push(high.clone());
                }
                ConditionEntry::In {
                    column,
                    values,
                    negated,
                    ..
                } => {
                    if values.is_empty() {
                        // Empty IN can match nothing; empty NOT IN excludes
                        // nothing.
                        sql.push_str(if *negated { "1 = 1" } else { "0 = 1" });
                    } else {
                        let keyword = if *negated { "NOT IN" } else { "IN" };
                        let placeholders = vec!["?"; values.len()].join(", ");
                        sql.push_str(&format!("{} {} ({})", column, keyword, placeholders));
                        bindings.extend(values.iter().cloned());
                    }
                }
                ConditionEntry::Raw {
                    sql: raw,
                    bindings: raw_bindings,
                    ..
                } => {
                    sql.push_str(raw);
                    bindings.extend(raw_bindings.iter().cloned());
                }
                ConditionEntry::Exists {
                    negated,
                    subquery,
                    bindings: sub_bindings,
                    ..
                } => {
                    let keyword = if *negated { "NOT EXISTS" } else { "EXISTS" };
                    sql.push_str(&format!("{} ({})", keyword, subquery));
                    bindings.extend(sub_bindings.iter().cloned());
                }
            }
        }

        (sql, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generation_is_deterministic() {
        let q = QueryBuilder::from_table("users")
            .select("id, name")
            .where_gt("age", 25)
            .order_by("name");
        assert_eq!(q.to_sql(), q.to_sql());
        assert_eq!(q.to_sql_with_bindings(), q.to_sql_with_bindings());
    }

    #[test]
    fn plain_select_shape() {
        let q = QueryBuilder::from_table("users")
            .select("id, name")
            .where_gt("age", 25)
            .order_by_desc("name")
            .limit(10)
            .offset(5);
        assert_eq!(
            q.to_sql(),
            "SELECT id, name FROM users WHERE age > ? ORDER BY name DESC LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn connectors_join_entries() {
        let q = QueryBuilder::from_table("users")
            .where_eq("active", true)
            .or_where_eq("admin", true)
            .where_null("deleted_at");
        let (sql, bindings) = q.to_sql_with_bindings();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE active = ? OR admin = ? AND deleted_at IS NULL"
        );
        assert_eq!(bindings, vec![json!(true), json!(true)]);
    }

    #[test]
    fn between_binds_low_then_high() {
        let q = QueryBuilder::from_table("users").where_between("age", 25, 35);
        let (sql, bindings) = q.to_sql_with_bindings();
        assert!(sql.contains("age BETWEEN ? AND ?"));
        assert_eq!(bindings, vec![json!(25), json!(35)]);
    }

    #[test]
    fn empty_in_is_always_false() {
        let q = QueryBuilder::from_table("users").where_in::<Value>("id", vec![]);
        assert_eq!(q.to_sql(), "SELECT * FROM users WHERE 0 = 1");

        let q = QueryBuilder::from_table("users").where_not_in::<Value>("id", vec![]);
        assert_eq!(q.to_sql(), "SELECT * FROM users WHERE 1 = 1");
    }

    #[test]
    fn in_emits_one_placeholder_per_element() {
        let q = QueryBuilder::from_table("users").where_in("id", vec![1, 2, 3]);
        let (sql, bindings) = q.to_sql_with_bindings();
        assert_eq!(sql, "SELECT * FROM users WHERE id IN (?, ?, ?)");
        assert_eq!(bindings, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn group_safety_rewrites_ungrouped_plain_columns() {
        let q = QueryBuilder::from_table("employees")
            .select("id, name, dept")
            .group_by("dept");
        assert_eq!(
            q.to_sql(),
            "SELECT MAX(id) AS id, MAX(name) AS name, dept FROM employees GROUP BY dept"
        );
    }

    #[test]
    fn group_safety_leaves_aggregates_alone() {
        let q = QueryBuilder::from_table("employees")
            .select("dept, COUNT(*)")
            .group_by("dept");
        assert_eq!(
            q.to_sql(),
            "SELECT dept, COUNT(*) FROM employees GROUP BY dept"
        );
    }

    #[test]
    fn joins_render_in_insertion_order() {
        let q = QueryBuilder::from_table("users")
            .join("posts", "posts.user_id", "=", "users.id")
            .left_join("profiles", "profiles.user_id", "=", "users.id");
        assert_eq!(
            q.to_sql(),
            "SELECT * FROM users \
             INNER JOIN posts ON posts.user_id = users.id \
             LEFT JOIN profiles ON profiles.user_id = users.id"
        );
    }

    #[test]
    fn negative_limit_means_no_limit() {
        let q = QueryBuilder::from_table("users").limit(-1);
        assert_eq!(q.to_sql(), "SELECT * FROM users");

        let q = QueryBuilder::from_table("users").limit(0);
        assert_eq!(q.to_sql(), "SELECT * FROM users LIMIT 0");
    }

    // Regression for the historical binder defect: raw WHERE bindings must
    // precede raw ORDER BY bindings because that is their textual order.
    #[test]
    fn where_raw_and_order_by_raw_bind_in_textual_order() {
        let q = QueryBuilder::from_table("users")
            .select_raw("COALESCE(nick, ?) AS label", vec![json!("anon")])
            .where_raw("age > ?", vec![json!(25)])
            .where_eq("active", true)
            .order_by_raw("FIELD(status, ?, ?)", vec![json!("new"), json!("old")]);
        let (sql, bindings) = q.to_sql_with_bindings();

        assert_eq!(sql.matches('?').count(), bindings.len());
        assert_eq!(
            bindings,
            vec![
                json!("anon"),
                json!(25),
                json!(true),
                json!("new"),
                json!("old")
            ]
        );
    }
}
