//! SQL Bridge MCP Server
//!
//! Serves MCP tools over SSE and runs SQL against a Postgres database.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use sql_bridge_mcp::config::Config;
use sql_bridge_mcp::db::client::PgStore;
use sql_bridge_mcp::db::executor::QueryExecutor;
use sql_bridge_mcp::db::Store;
use sql_bridge_mcp::error::Result;
use sql_bridge_mcp::mcp::dispatcher::Dispatcher;
use sql_bridge_mcp::mcp::tools::ToolHandler;
use sql_bridge_mcp::transport::http::router;
use sql_bridge_mcp::transport::SessionTransport;

/// SQL Bridge MCP Server
#[derive(Parser)]
#[command(name = "sql-bridge-mcp")]
#[command(author, version, about = "SQL Bridge MCP Server - SQL tools for agents over SSE")]
struct Cli {
    /// Address to bind (overrides SQL_BRIDGE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Postgres connection string (overrides DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the database connection and list its tables, then exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::new()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.database_url.is_some() {
        config.database_url = cli.database_url;
    }

    match cli.command {
        Some(Commands::Check) => check_database(&config).await,
        None => run_server(config).await,
    }
}

async fn check_database(config: &Config) -> Result<()> {
    let store = PgStore::connect(config).await?;
    store.health_check().await?;

    let tables = store.catalog_tables().await?;
    eprintln!("Database reachable. Tables: {}", tables.join(", "));
    Ok(())
}

async fn run_server(config: Config) -> Result<()> {
    let store = PgStore::connect(&config).await?;
    store.health_check().await?;

    let transport = Arc::new(SessionTransport::new());
    if let Some(idle_timeout) = config.idle_timeout {
        tracing::info!(idle_timeout_secs = idle_timeout.as_secs(), "Idle session reaping enabled");
        transport.spawn_idle_reaper(idle_timeout);
    }

    let tool_handler = ToolHandler::new(QueryExecutor::new(Arc::new(store)));
    let dispatcher = Dispatcher::new(transport, tool_handler);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!("MCP server listening on {} (SSE at /sse)", config.bind_addr());

    axum::serve(listener, router(dispatcher)).await?;
    Ok(())
}
