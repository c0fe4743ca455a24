//! Integration tests over a scripted mock backend
//!
//! `MockConnection` hands out scripted results in prepare order and keeps
//! an execution log of SQL text plus bound parameters, so tests can assert
//! both what was asked of the database and how many round trips it took.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::backends::{BindValue, Connection, SqlRow, Statement};
use crate::error::{ModelError, OrmResult};
use crate::query::builder::QueryBuilder;
use crate::relationships::metadata::{PivotConfig, RelationshipMetadata};
use crate::relationships::registry::RelationshipRegistry;

/// One statement as the mock saw it executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub bindings: Vec<BindValue>,
}

#[derive(Debug, Clone, Default)]
struct ScriptedResult {
    rows: VecDeque<SqlRow>,
    affected: u64,
    error: Option<String>,
}

/// Scripted backend double. Each `prepare` consumes the next scripted
/// result; unscripted statements succeed with an empty result.
pub struct MockConnection {
    scripts: Mutex<VecDeque<ScriptedResult>>,
    log: Arc<Mutex<Vec<ExecutedStatement>>>,
    last_insert: AtomicI64,
    columns: Mutex<HashMap<String, Vec<String>>>,
    releases: Mutex<Vec<Arc<AtomicBool>>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            last_insert: AtomicI64::new(1),
            columns: Mutex::new(HashMap::new()),
            releases: Mutex::new(Vec::new()),
        }
    }

    pub fn push_rows(&self, rows: Vec<SqlRow>) {
        self.scripts.lock().unwrap().push_back(ScriptedResult {
            rows: rows.into(),
            ..Default::default()
        });
    }

    pub fn push_affected(&self, affected: u64) {
        self.scripts.lock().unwrap().push_back(ScriptedResult {
            affected,
            ..Default::default()
        });
    }

    pub fn push_error(&self, message: &str) {
        self.scripts.lock().unwrap().push_back(ScriptedResult {
            error: Some(message.to_string()),
            ..Default::default()
        });
    }

    pub fn set_last_insert_id(&self, id: i64) {
        self.last_insert.store(id, Ordering::SeqCst);
    }

    pub fn set_columns(&self, table: &str, columns: Vec<&str>) {
        self.columns.lock().unwrap().insert(
            table.to_string(),
            columns.into_iter().map(str::to_string).collect(),
        );
    }

    pub fn statements(&self) -> Vec<ExecutedStatement> {
        self.log.lock().unwrap().clone()
    }

    pub fn release_flags(&self) -> Vec<Arc<AtomicBool>> {
        self.releases.lock().unwrap().clone()
    }
}

struct MockStatement {
    sql: String,
    binds: Vec<BindValue>,
    result: ScriptedResult,
    log: Arc<Mutex<Vec<ExecutedStatement>>>,
    released: Arc<AtomicBool>,
}

#[async_trait]
impl Statement for MockStatement {
    fn bind(&mut self, index: usize, value: BindValue) -> OrmResult<()> {
        if self.binds.len() <= index {
            self.binds.resize(index + 1, BindValue::Null);
        }
        self.binds[index] = value;
        Ok(())
    }

    async fn execute(&mut self) -> OrmResult<()> {
        if let Some(message) = self.result.error.take() {
            return Err(ModelError::Database(message));
        }
        self.log.lock().unwrap().push(ExecutedStatement {
            sql: self.sql.clone(),
            bindings: self.binds.clone(),
        });
        Ok(())
    }

    async fn fetch_row(&mut self) -> OrmResult<Option<SqlRow>> {
        Ok(self.result.rows.pop_front())
    }

    fn row_count(&self) -> u64 {
        self.result.affected
    }
}

impl Drop for MockStatement {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn prepare(&self, sql: &str) -> OrmResult<Box<dyn Statement>> {
        let result = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let released = Arc::new(AtomicBool::new(false));
        self.releases.lock().unwrap().push(Arc::clone(&released));
        Ok(Box::new(MockStatement {
            sql: sql.to_string(),
            binds: Vec::new(),
            result,
            log: Arc::clone(&self.log),
            released,
        }))
    }

    async fn last_insert_id(&self) -> OrmResult<i64> {
        Ok(self.last_insert.load(Ordering::SeqCst))
    }

    async fn columns_of(&self, table: &str) -> OrmResult<Vec<String>> {
        self.columns
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| ModelError::Database(format!("unknown table '{}'", table)))
    }
}

fn row(pairs: &[(&str, Value)]) -> SqlRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Users have many posts, posts have many comments and belong to a user,
/// users have many roles through a pivot carrying a `granted_at` column.
fn blog_registry() -> Arc<RelationshipRegistry> {
    let registry = RelationshipRegistry::new();
    registry
        .register(
            "User",
            RelationshipMetadata::has_many("posts", "posts", "Post", "user_id"),
        )
        .unwrap();
    registry
        .register(
            "Post",
            RelationshipMetadata::has_many("comments", "comments", "Comment", "post_id"),
        )
        .unwrap();
    registry
        .register(
            "Post",
            RelationshipMetadata::belongs_to("user", "users", "User", "user_id"),
        )
        .unwrap();
    registry
        .register(
            "User",
            RelationshipMetadata::belongs_to_many(
                "roles",
                "roles",
                "Role",
                PivotConfig::new("user_roles", "user_id", "role_id")
                    .with_columns(vec!["granted_at"]),
            ),
        )
        .unwrap();
    Arc::new(registry)
}

fn users_query() -> QueryBuilder {
    QueryBuilder::for_entity("User", "users", blog_registry())
}

#[tokio::test]
async fn eager_load_issues_one_query_per_level() {
    let conn = MockConnection::new();
    conn.push_rows(vec![
        row(&[("id", json!(1)), ("name", json!("ada"))]),
        row(&[("id", json!(2)), ("name", json!("grace"))]),
        row(&[("id", json!(3)), ("name", json!("joan"))]),
    ]);
    conn.push_rows(vec![
        row(&[("id", json!(10)), ("user_id", json!(1))]),
        row(&[("id", json!(11)), ("user_id", json!(1))]),
        row(&[("id", json!(12)), ("user_id", json!(3))]),
    ]);

    let users = users_query().with("posts").get(&conn).await.unwrap();

    let statements = conn.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].sql, "SELECT * FROM users");
    assert_eq!(
        statements[1].sql,
        "SELECT * FROM posts WHERE user_id IN (?, ?, ?)"
    );
    assert_eq!(
        statements[1].bindings,
        vec![
            BindValue::Integer(1),
            BindValue::Integer(2),
            BindValue::Integer(3)
        ]
    );

    assert_eq!(users[0].relation("posts").unwrap().as_many().unwrap().len(), 2);
    assert!(users[1].relation("posts").unwrap().as_many().unwrap().is_empty());
    assert_eq!(users[2].relation("posts").unwrap().as_many().unwrap().len(), 1);
}

#[tokio::test]
async fn nested_path_costs_one_query_per_segment() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("id", json!(1))])]);
    conn.push_rows(vec![
        row(&[("id", json!(10)), ("user_id", json!(1))]),
        row(&[("id", json!(11)), ("user_id", json!(1))]),
    ]);
    conn.push_rows(vec![
        row(&[("id", json!(100)), ("post_id", json!(10))]),
        row(&[("id", json!(101)), ("post_id", json!(10))]),
        row(&[("id", json!(102)), ("post_id", json!(11))]),
    ]);

    let users = users_query().with("posts.comments").get(&conn).await.unwrap();

    let statements = conn.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[2].sql,
        "SELECT * FROM comments WHERE post_id IN (?, ?)"
    );

    let posts = users[0].relation("posts").unwrap().as_many().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(
        posts[0].relation("comments").unwrap().as_many().unwrap().len(),
        2
    );
    assert_eq!(
        posts[1].relation("comments").unwrap().as_many().unwrap().len(),
        1
    );
}

#[tokio::test]
async fn eager_constraint_applies_to_the_batched_query() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("id", json!(1))])]);
    conn.push_rows(vec![]);

    users_query()
        .with_constraint("posts", |posts| posts.where_eq("published", true))
        .get(&conn)
        .await
        .unwrap();

    let statements = conn.statements();
    assert_eq!(
        statements[1].sql,
        "SELECT * FROM posts WHERE user_id IN (?) AND published = ?"
    );
    assert_eq!(
        statements[1].bindings,
        vec![BindValue::Integer(1), BindValue::Boolean(true)]
    );
}

#[tokio::test]
async fn many_to_many_projects_and_strips_pivot_columns() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("id", json!(4))])]);
    conn.push_rows(vec![
        row(&[
            ("id", json!(1)),
            ("name", json!("admin")),
            ("__pivot_user_id", json!(4)),
            ("__pivot_role_id", json!(1)),
            ("__pivot_granted_at", json!("2024-01-01")),
        ]),
        row(&[
            ("id", json!(2)),
            ("name", json!("editor")),
            ("__pivot_user_id", json!(4)),
            ("__pivot_role_id", json!(2)),
            ("__pivot_granted_at", json!("2024-02-01")),
        ]),
    ]);

    let users = users_query().with("roles").get(&conn).await.unwrap();

    let statements = conn.statements();
    assert_eq!(
        statements[1].sql,
        "SELECT roles.*, user_roles.user_id AS __pivot_user_id, \
         user_roles.role_id AS __pivot_role_id, \
         user_roles.granted_at AS __pivot_granted_at \
         FROM roles INNER JOIN user_roles ON user_roles.role_id = roles.id \
         WHERE user_roles.user_id IN (?)"
    );

    let roles = users[0].relation("roles").unwrap().as_many().unwrap();
    assert_eq!(roles.len(), 2);
    assert_eq!(roles[0].get("name"), Some(&json!("admin")));
    assert!(roles[0].get("__pivot_granted_at").is_none());
    let pivot = roles[0].pivot().unwrap();
    assert_eq!(pivot.get("granted_at"), Some(&json!("2024-01-01")));
    assert_eq!(pivot.get("user_id"), Some(&json!(4)));
}

#[tokio::test]
async fn sync_partitions_desired_against_current() {
    let conn = MockConnection::new();
    // current pivot rows for the parent: roles 1 and 2
    conn.push_rows(vec![
        row(&[("role_id", json!(1))]),
        row(&[("role_id", json!(2))]),
    ]);
    conn.push_affected(1); // detach
    conn.push_affected(1); // attach

    let metadata = blog_registry().get("User", "roles").unwrap();
    let parent = crate::model::Record::from_attributes(
        [("id".to_string(), json!(4))].into_iter().collect(),
    );

    let report = metadata
        .sync(&conn, &parent, vec![json!(2), json!(3)])
        .await
        .unwrap();
    assert_eq!(report.attached, vec![json!(3)]);
    assert_eq!(report.detached, vec![json!(1)]);
    assert_eq!(report.unchanged, vec![json!(2)]);

    let statements = conn.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[0].sql,
        "SELECT * FROM user_roles WHERE user_id = ?"
    );
    // detach before attach
    assert_eq!(
        statements[1].sql,
        "DELETE FROM user_roles WHERE user_id = ? AND role_id IN (?)"
    );
    assert_eq!(
        statements[1].bindings,
        vec![BindValue::Integer(4), BindValue::Integer(1)]
    );
    assert_eq!(
        statements[2].sql,
        "INSERT INTO user_roles (role_id, user_id) VALUES (?, ?)"
    );
    assert_eq!(
        statements[2].bindings,
        vec![BindValue::Integer(3), BindValue::Integer(4)]
    );
}

#[tokio::test]
async fn paginate_counts_then_fetches_the_page() {
    let conn = MockConnection::new();
    conn.push_rows(vec![row(&[("aggregate", json!(42))])]);
    conn.push_rows(vec![
        row(&[("id", json!(11))]),
        row(&[("id", json!(12))]),
    ]);

    let page = QueryBuilder::from_table("users")
        .order_by("id")
        .paginate(&conn, 2, 10)
        .await
        .unwrap();

    assert_eq!(page.total, 42);
    assert_eq!(page.last_page, 5);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.records.len(), 2);
    assert!(page.has_more_pages());

    let statements = conn.statements();
    assert_eq!(
        statements[0].sql,
        "SELECT COUNT(*) AS aggregate FROM users"
    );
    assert_eq!(
        statements[1].sql,
        "SELECT * FROM users ORDER BY id ASC LIMIT 10 OFFSET 10"
    );
}

#[tokio::test]
async fn insert_returns_the_generated_id() {
    let conn = MockConnection::new();
    conn.push_affected(1);
    conn.set_last_insert_id(99);

    let id = QueryBuilder::from_table("users")
        .insert(
            &conn,
            [
                ("name".to_string(), json!("ada")),
                ("email".to_string(), json!("ada@example.com")),
            ]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();
    assert_eq!(id, 99);

    let statements = conn.statements();
    // columns serialize in sorted order
    assert_eq!(
        statements[0].sql,
        "INSERT INTO users (email, name) VALUES (?, ?)"
    );
}

#[tokio::test]
async fn insert_many_chunks_large_batches() {
    let conn = MockConnection::new();
    conn.push_affected(500);
    conn.push_affected(500);
    conn.push_affected(200);

    let rows: Vec<HashMap<String, Value>> = (0..1200)
        .map(|n| [("n".to_string(), json!(n))].into_iter().collect())
        .collect();
    let affected = QueryBuilder::from_table("numbers")
        .insert_many(&conn, rows)
        .await
        .unwrap();

    assert_eq!(affected, 1200);
    let statements = conn.statements();
    assert_eq!(statements.len(), 3);
    assert_eq!(statements[2].bindings.len(), 200);
}

#[tokio::test]
async fn insert_many_rejects_ragged_rows() {
    let conn = MockConnection::new();
    let rows: Vec<HashMap<String, Value>> = vec![
        [("a".to_string(), json!(1))].into_iter().collect(),
        [("b".to_string(), json!(2))].into_iter().collect(),
    ];
    let err = QueryBuilder::from_table("t")
        .insert_many(&conn, rows)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Validation(_)));
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn upsert_swallows_conflict_errors_when_asked() {
    let conn = MockConnection::new();
    conn.push_error("duplicate key");

    let rows: Vec<HashMap<String, Value>> = vec![[
        ("email".to_string(), json!("ada@example.com")),
        ("name".to_string(), json!("ada")),
    ]
    .into_iter()
    .collect()];

    let affected = QueryBuilder::from_table("users")
        .upsert(rows.clone(), vec!["email"])
        .ignore_errors()
        .execute(&conn)
        .await
        .unwrap();
    assert_eq!(affected, 0);

    conn.push_error("duplicate key");
    let err = QueryBuilder::from_table("users")
        .upsert(rows, vec!["email"])
        .execute(&conn)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Database(_)));
}

#[tokio::test]
async fn grouped_star_projection_expands_and_rewrites() {
    let conn = MockConnection::new();
    conn.set_columns("orders", vec!["id", "status", "total"]);
    conn.push_rows(vec![]);

    QueryBuilder::from_table("orders")
        .group_by("status")
        .get(&conn)
        .await
        .unwrap();

    assert_eq!(
        conn.statements()[0].sql,
        "SELECT MAX(id) AS id, status, MAX(total) AS total FROM orders GROUP BY status"
    );
}

#[tokio::test]
async fn stream_yields_lazily_and_releases_on_drop() {
    let conn = MockConnection::new();
    conn.push_rows(vec![
        row(&[("id", json!(1))]),
        row(&[("id", json!(2))]),
    ]);

    let mut stream = QueryBuilder::from_table("users").stream(&conn).await.unwrap();
    assert!(!conn.release_flags()[0].load(Ordering::SeqCst));

    assert_eq!(
        stream.next().await.unwrap().unwrap().get("id"),
        Some(&json!(1))
    );
    // abandon the stream early; the statement must still be released
    drop(stream);
    assert!(conn.release_flags()[0].load(Ordering::SeqCst));
}

#[tokio::test]
async fn first_or_fail_names_the_table() {
    let conn = MockConnection::new();
    conn.push_rows(vec![]);
    let err = QueryBuilder::from_table("users")
        .where_eq("id", 1)
        .first_or_fail(&conn)
        .await
        .unwrap_err();
    assert_eq!(err, ModelError::NotFound("users".to_string()));
}
