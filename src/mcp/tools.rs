//! MCP Tool definitions and handlers
//!
//! The tool set is closed: every tool is a [`ToolKind`] variant with a typed
//! argument struct, and its JSON Schema is derived from that struct.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::db::executor::QueryExecutor;
use crate::error::ToolError;
use crate::mcp::types::{CallToolResult, Tool};

/// Built-in tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListTables,
    QueryDatabase,
    Echo,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::ListTables, ToolKind::QueryDatabase, ToolKind::Echo];

    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListTables => "list_tables",
            ToolKind::QueryDatabase => "query_database",
            ToolKind::Echo => "echo_tool",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ListTables => "Lists the tables in the database's default schema",
            ToolKind::QueryDatabase => {
                "Executes a SQL statement and returns the resulting rows as JSON. \
                 Statements containing DROP, TRUNCATE or ALTER are refused."
            }
            ToolKind::Echo => "Echoes a message back, useful to check the connection",
        }
    }

    fn input_schema(self) -> Value {
        match self {
            ToolKind::ListTables => schema_of::<ListTablesArgs>(),
            ToolKind::QueryDatabase => schema_of::<QueryDatabaseArgs>(),
            ToolKind::Echo => schema_of::<EchoArgs>(),
        }
    }
}

/// Arguments for `list_tables`
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListTablesArgs {}

/// Arguments for `query_database`
#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct QueryDatabaseArgs {
    /// SQL statement to execute
    #[validate(length(min = 1, message = "sql must not be empty"))]
    pub sql: String,
}

/// Arguments for `echo_tool`
#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct EchoArgs {
    /// Message to echo back
    pub message: String,
}

/// A validated tool invocation
#[derive(Debug)]
pub enum ToolCall {
    ListTables,
    QueryDatabase(QueryDatabaseArgs),
    Echo(EchoArgs),
}

impl ToolCall {
    /// Decode and validate raw arguments for a tool
    pub fn parse(kind: ToolKind, args: Value) -> Result<Self, ToolError> {
        match kind {
            ToolKind::ListTables => Ok(ToolCall::ListTables),
            ToolKind::QueryDatabase => parse_args(args).map(ToolCall::QueryDatabase),
            ToolKind::Echo => parse_args(args).map(ToolCall::Echo),
        }
    }
}

fn parse_args<T>(args: Value) -> Result<T, ToolError>
where
    T: DeserializeOwned + Validate,
{
    // A call without arguments arrives as null
    let args = if args.is_null() { json!({}) } else { args };

    let parsed: T = serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        message: e.to_string(),
    })?;
    parsed.validate().map_err(|e| ToolError::InvalidArguments {
        message: e.to_string(),
    })?;
    Ok(parsed)
}

fn schema_of<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object
            .entry("properties")
            .or_insert_with(|| json!({}));
    }
    schema
}

/// Registered tool
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

impl ToolDefinition {
    fn new(kind: ToolKind) -> Self {
        Self {
            kind,
            name: kind.name(),
            description: kind.description(),
            input_schema: kind.input_schema(),
        }
    }

    /// Protocol view of this definition
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Tool definitions, populated once at startup
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Registry holding every built-in tool
    pub fn new() -> Self {
        Self {
            definitions: ToolKind::ALL.into_iter().map(ToolDefinition::new).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Tool handler
pub struct ToolHandler {
    registry: ToolRegistry,
    executor: QueryExecutor,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            registry: ToolRegistry::new(),
            executor,
        }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.definitions().iter().map(ToolDefinition::to_tool).collect()
    }

    /// Call a tool by name. Failures of any kind come back as an error result.
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        match self.invoke(name, args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = name, "Tool call failed: {}", e);
                CallToolResult::error(e.to_string())
            }
        }
    }

    async fn invoke(&self, name: &str, args: Value) -> Result<CallToolResult, ToolError> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound {
                name: name.to_string(),
            })?;

        match ToolCall::parse(definition.kind, args)? {
            ToolCall::ListTables => self.executor.list_tables().await,
            ToolCall::QueryDatabase(args) => self.executor.query(&args.sql).await,
            ToolCall::Echo(args) => Ok(CallToolResult::text(format!("Echo: {}", args.message))),
        }
    }
}
