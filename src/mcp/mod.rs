//! MCP (Model Context Protocol) module
//!
//! Protocol types, the tool set, and the dispatcher that ties tools to
//! sessions.

pub mod dispatcher;
pub mod tools;
pub mod types;
