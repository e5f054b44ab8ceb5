//! Query executor
//!
//! Runs the built-in database tools against a [`Store`] and turns rows or
//! failures into tool results.

use std::sync::Arc;

use serde_json::Value;

use crate::db::filter::{check_statement, FilterVerdict};
use crate::db::Store;
use crate::error::ToolError;
use crate::mcp::types::CallToolResult;

/// Executes tool statements against the store
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn Store>,
}

impl QueryExecutor {
    /// Create a new executor
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Comma-joined table names of the default schema
    pub async fn list_tables(&self) -> Result<CallToolResult, ToolError> {
        let tables = self.store.catalog_tables().await.map_err(|e| {
            tracing::warn!("Listing tables failed: {}", e);
            e
        })?;
        Ok(CallToolResult::text(tables.join(", ")))
    }

    /// Filter, then run a statement verbatim. Rows come back as a compact JSON
    /// array of objects, in text and as structured content.
    pub async fn query(&self, sql: &str) -> Result<CallToolResult, ToolError> {
        if let FilterVerdict::Rejected(reason) = check_statement(sql) {
            tracing::warn!(%reason, "Statement blocked by denylist");
            return Err(ToolError::FilterRejected { reason });
        }

        let rows = self.store.execute(sql).await.map_err(|e| {
            tracing::warn!("Statement failed: {}", e);
            e
        })?;
        tracing::debug!(rows = rows.len(), "Statement executed");

        let value = Value::Array(rows.into_iter().map(Value::Object).collect());
        Ok(CallToolResult::structured(value.to_string(), value))
    }
}
