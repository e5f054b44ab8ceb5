//! In-memory store for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::db::{Row, Store};
use crate::error::StoreError;

pub(crate) struct FakeStore {
    tables: Vec<String>,
    calls: AtomicUsize,
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::with_tables(&["users", "orders"])
    }

    pub(crate) fn with_tables(tables: &[&str]) -> Self {
        Self {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of statements that reached the store
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if sql.contains("pg_sleep") {
            tokio::time::sleep(Duration::from_millis(200)).await;
            return Ok(Vec::new());
        }
        if sql.contains("missing") {
            return Err(StoreError::Query {
                message: "relation \"missing\" does not exist".to_string(),
            });
        }
        if sql.trim().eq_ignore_ascii_case("select 1") {
            let row = json!({"?column?": 1});
            return Ok(row.as_object().cloned().into_iter().collect());
        }
        Ok(Vec::new())
    }

    async fn catalog_tables(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.tables.clone())
    }
}
