//! Shared fixtures for integration tests
//!
//! `ScriptedClient` is an in-memory `RemoteDataClient`: tables hold JSON rows,
//! and individual operations can be scripted to fail, panic or stall.

#![allow(dead_code)]

use async_trait::async_trait;
use blog_doctor::client::{QueryOptions, QueryResponse, RemoteDataClient, Session};
use blog_doctor::ClientError;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted in-memory backend
///
/// Failure, panic and delay keys are either a collection name (applies to every
/// operation on it), `insert:<table>`, `delete:<table>`, `query:<table>`,
/// `rpc:<function>` or `session`. Errors registered with `fail_after_commit`
/// are returned by `insert` after the row has been stored.
#[derive(Default)]
pub struct ScriptedClient {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    functions: HashMap<String, Value>,
    failures: HashMap<String, ClientError>,
    late_failures: HashMap<String, ClientError>,
    panics: HashSet<String>,
    delays: HashMap<String, Duration>,
    session: Option<Session>,
    unreachable: bool,
    next_id: AtomicU64,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, rows: Vec<Value>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), rows);
        self
    }

    pub fn with_function(mut self, name: &str, returns: Value) -> Self {
        self.functions.insert(name.to_string(), returns);
        self
    }

    pub fn with_session(mut self, user_id: &str) -> Self {
        self.session = Some(Session {
            user_id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
            role: Some("authenticated".to_string()),
        });
        self
    }

    pub fn fail(mut self, key: &str, error: ClientError) -> Self {
        self.failures.insert(key.to_string(), error);
        self
    }

    /// Store inserted rows on `table`, then answer with `error`
    pub fn fail_after_commit(mut self, table: &str, error: ClientError) -> Self {
        self.late_failures.insert(table.to_string(), error);
        self
    }

    pub fn panic_on(mut self, key: &str) -> Self {
        self.panics.insert(key.to_string());
        self
    }

    pub fn delay(mut self, key: &str, duration: Duration) -> Self {
        self.delays.insert(key.to_string(), duration);
        self
    }

    /// Every call fails as if the backend could not be reached
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Operations seen so far, as `op:target`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, op: &str, target: &str) -> Result<(), ClientError> {
        let specific = format!("{}:{}", op, target);
        self.calls.lock().unwrap().push(specific.clone());

        if self.unreachable {
            return Err(ClientError::network(
                "error sending request: tcp connect error: Connection refused",
            ));
        }
        let keys = [specific.as_str(), target];
        if let Some(delay) = keys.iter().find_map(|k| self.delays.get(*k)) {
            tokio::time::sleep(*delay).await;
        }
        if keys.iter().any(|k| self.panics.contains(*k)) {
            panic!("scripted panic in {}", specific);
        }
        if let Some(error) = keys.iter().find_map(|k| self.failures.get(*k)) {
            return Err(error.clone());
        }
        Ok(())
    }

    fn missing_table(table: &str) -> ClientError {
        ClientError::api(
            Some(404),
            Some("PGRST205".to_string()),
            format!(
                "Could not find the table 'public.{}' in the schema cache",
                table
            ),
        )
    }
}

fn matches_filters(row: &Value, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(column, expected)| match row.get(column) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

fn id_of(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteDataClient for ScriptedClient {
    async fn query(
        &self,
        collection: &str,
        options: QueryOptions,
    ) -> Result<QueryResponse, ClientError> {
        self.enter("query", collection).await?;

        let tables = self.tables.lock().unwrap();
        let rows = tables
            .get(collection)
            .ok_or_else(|| Self::missing_table(collection))?;
        let matching: Vec<Value> = rows
            .iter()
            .filter(|r| matches_filters(r, &options.filters))
            .cloned()
            .collect();
        let count = options.count.then_some(matching.len() as u64);
        let limit = options.limit.unwrap_or(usize::MAX);

        Ok(QueryResponse {
            rows: matching.into_iter().take(limit).collect(),
            count,
        })
    }

    async fn insert(&self, collection: &str, record: Value) -> Result<Value, ClientError> {
        self.enter("insert", collection).await?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables
            .get_mut(collection)
            .ok_or_else(|| Self::missing_table(collection))?;
        let mut row = record;
        if row.get("id").is_none() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            row["id"] = json!(format!("row-{}", id));
        }
        rows.push(row.clone());
        if let Some(error) = self.late_failures.get(collection) {
            return Err(error.clone());
        }
        Ok(row)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), ClientError> {
        self.enter("delete", collection).await?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables
            .get_mut(collection)
            .ok_or_else(|| Self::missing_table(collection))?;
        rows.retain(|r| id_of(r).as_deref() != Some(id));
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, ClientError> {
        self.enter("session", "session").await?;
        Ok(self.session.clone())
    }

    async fn call_rpc(&self, function: &str, _args: Value) -> Result<Value, ClientError> {
        self.enter("rpc", function).await?;
        self.functions.get(function).cloned().ok_or_else(|| {
            ClientError::api(
                Some(404),
                Some("PGRST202".to_string()),
                format!(
                    "Could not find the function public.{} without parameters in the schema cache",
                    function
                ),
            )
        })
    }
}

/// A blog row carrying every required column
pub fn blog_row(id: &str, slug: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Post {}", id),
        "slug": slug,
        "content": "Body",
        "status": "published",
        "created_at": "2024-05-01T10:00:00Z",
        "target_url": "https://example.com",
    })
}

/// Backend where every standard check passes
pub fn healthy_client() -> ScriptedClient {
    ScriptedClient::new()
        .with_table(
            "blog_posts",
            vec![blog_row("1", "first-post"), blog_row("2", "second-post")],
        )
        .with_table("published_blog_posts", vec![blog_row("p1", "published")])
        .with_function("refresh_blog_stats", Value::Null)
        .with_session("editor")
}

pub fn policy_error() -> ClientError {
    ClientError::api(
        Some(403),
        Some("42501".to_string()),
        "new row violates row-level security policy for table \"blog_posts\"",
    )
}

pub fn unclassified_error() -> ClientError {
    ClientError::api(Some(500), None, "internal server error")
}
