//! SQL Bridge MCP Server Library
//!
//! A Model Context Protocol (MCP) server that exposes a relational database
//! to remote agents over an SSE transport.
//! Provides tools for listing tables and running SQL statements.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::{BridgeError, Result};
