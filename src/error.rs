//! Error types for the SQL bridge
//!
//! Transport errors surface on the request channel as HTTP failures. Tool
//! errors surface inside a tool result on the push channel.

use thiserror::Error;

/// Main error type for the SQL bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session routing errors
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Tool invocation errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Data store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Errors raised while correlating a request with its session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Unknown session: {session_id}")]
    UnknownSession { session_id: String },

    #[error("Session closed: {session_id}")]
    SessionClosed { session_id: String },

    #[error("Invalid message: {message}")]
    InvalidMessage { message: String },
}

/// Tool-level errors, reported to the client as `isError` results
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Statement rejected: {reason}")]
    FilterRejected { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Data store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The statement reached the database and failed there
    #[error("{message}")]
    Query { message: String },

    /// Pool, connection or protocol failure
    #[error("Database unavailable: {message}")]
    Unavailable { message: String },
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => StoreError::Query {
                message: db.message().to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::TypeNotFound { .. } => {
                StoreError::Query {
                    message: err.to_string(),
                }
            }
            other => StoreError::Unavailable {
                message: other.to_string(),
            },
        }
    }
}

impl From<sqlx::Error> for BridgeError {
    fn from(err: sqlx::Error) -> Self {
        BridgeError::Store(StoreError::from(err))
    }
}
