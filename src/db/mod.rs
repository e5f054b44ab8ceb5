//! Relational store access
//!
//! The [`Store`] trait is the seam between tool handlers and the database;
//! [`client::PgStore`] is the Postgres implementation.

pub mod client;
pub mod executor;
pub mod filter;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// One result row, keyed by column name in select-list order
pub type Row = Map<String, Value>;

/// Data store client used by the built-in tools
#[async_trait]
pub trait Store: Send + Sync {
    /// Execute a statement verbatim and return its rows
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError>;

    /// Names of the tables in the default schema, in catalog order
    async fn catalog_tables(&self) -> Result<Vec<String>, StoreError>;
}
