//! Postgres store client
//!
//! Pool construction, startup health check, and row-to-JSON conversion.
//!
//! Statements run over the simple query protocol, so a statement list is
//! accepted and every column arrives in Postgres text form. Types without a
//! dedicated JSON mapping are returned as that text.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Decimal;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::config::Config;
use crate::db::{Row, Store};
use crate::error::{Result, StoreError};

/// Tables of the connection's current schema
const CATALOG_TABLES_SQL: &str = "SELECT table_name::text FROM information_schema.tables \
     WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'";

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool using the configured connection string
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(config.database_url()?)
            .await?;

        tracing::info!(max_connections = config.max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    /// Round-trip a trivial query to prove the database is reachable
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn execute(&self, sql: &str) -> std::result::Result<Vec<Row>, StoreError> {
        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn catalog_tables(&self) -> std::result::Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar::<_, String>(CATALOG_TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|column| {
            let value = column_value(row, column.ordinal(), column.type_info().name());
            (column.name().to_string(), value)
        })
        .collect()
}

fn column_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::Null,
    }

    let decoded = match type_name {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "OID" => row
            .try_get::<sqlx::postgres::types::Oid, _>(index)
            .map(|oid| Value::from(oid.0)),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::from),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" | "CITEXT" => {
            row.try_get::<String, _>(index).map(Value::from)
        }
        "NUMERIC" => row.try_get::<Decimal, _>(index).map(decimal_to_json),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(index)
            .map(|id| Value::from(id.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|ts| Value::from(ts.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|ts| Value::from(ts.to_string())),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .map(|d| Value::from(d.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .map(|t| Value::from(t.to_string())),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|b| Value::from(format!("<bytea {} bytes>", b.len()))),
        _ => return text_value(row, index),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!("Failed to decode {} column {}, using text: {}", type_name, index, e);
        text_value(row, index)
    })
}

/// Column value as Postgres renders it (`{1,2}`, `1 day`, enum labels, ...)
fn text_value(row: &PgRow, index: usize) -> Value {
    row.try_get_unchecked::<String, _>(index)
        .map(Value::from)
        .unwrap_or_else(|e| {
            tracing::debug!("Column {} has no text form: {}", index, e);
            Value::Null
        })
}

/// Numbers that survive the trip through `f64` become JSON numbers; wider
/// precision is kept as a string.
fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() && float.to_string() == text => Value::from(float),
        _ => Value::from(text),
    }
}
