//! Integration tests for the SQL bridge
//!
//! These tests drive the HTTP router end to end: a push channel opened with
//! `GET /sse`, requests posted to `/messages`, answers read off the stream.
//! The database is replaced by an in-memory store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tower::ServiceExt;

use sql_bridge_mcp::db::executor::QueryExecutor;
use sql_bridge_mcp::db::{Row, Store};
use sql_bridge_mcp::error::StoreError;
use sql_bridge_mcp::mcp::dispatcher::Dispatcher;
use sql_bridge_mcp::mcp::tools::ToolHandler;
use sql_bridge_mcp::transport::http::router;
use sql_bridge_mcp::transport::SessionTransport;

/// Store fixture that counts the statements reaching it
struct CountingStore {
    calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sql.trim().eq_ignore_ascii_case("select 1") {
            let row = json!({"?column?": 1});
            return Ok(row.as_object().cloned().into_iter().collect());
        }
        Err(StoreError::Query {
            message: format!("syntax error at or near \"{}\"", sql),
        })
    }

    async fn catalog_tables(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec!["a".to_string(), "b".to_string()])
    }
}

struct Harness {
    app: Router,
    dispatcher: Dispatcher,
    store: Arc<CountingStore>,
}

fn harness() -> Harness {
    let store = Arc::new(CountingStore::new());
    let tool_handler = ToolHandler::new(QueryExecutor::new(store.clone()));
    let dispatcher = Dispatcher::new(Arc::new(SessionTransport::new()), tool_handler);
    Harness {
        app: router(dispatcher.clone()),
        dispatcher,
        store,
    }
}

/// Parse one SSE frame into (event, data)
async fn next_event(stream: &mut BodyDataStream) -> (String, String) {
    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("timed out waiting for SSE event")
        .expect("SSE stream ended")
        .expect("SSE stream failed");
    let text = String::from_utf8_lossy(&chunk).to_string();

    let mut event = String::new();
    let mut data = String::new();
    for line in text.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push_str(value.trim());
        }
    }
    (event, data)
}

async fn next_message(stream: &mut BodyDataStream) -> Value {
    let (event, data) = next_event(stream).await;
    assert_eq!(event, "message");
    serde_json::from_str(&data).expect("message data is JSON")
}

/// Open a push channel and return its session id and body stream
async fn open_sse(app: &Router) -> (String, BodyDataStream) {
    let response = app
        .clone()
        .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let mut stream = response.into_body().into_data_stream();
    let (event, data) = next_event(&mut stream).await;
    assert_eq!(event, "endpoint");
    let session_id = data
        .split("sessionId=")
        .nth(1)
        .expect("endpoint carries sessionId")
        .to_string();
    (session_id, stream)
}

async fn post(app: &Router, session_id: Option<&str>, body: String) -> (StatusCode, String) {
    let uri = match session_id {
        Some(id) => format!("/messages?sessionId={}", id),
        None => "/messages".to_string(),
    };
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn tool_call(id: i64, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string()
}

mod request_channel_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_session_is_500() {
        let h = harness();
        let (status, body) = post(&h.app, Some("does-not-exist"), tool_call(1, "list_tables", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "No active session");
    }

    #[tokio::test]
    async fn test_missing_session_id_is_400() {
        let h = harness();
        let (status, _) = post(&h.app, None, tool_call(1, "list_tables", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let h = harness();
        let (session_id, _stream) = open_sse(&h.app).await;
        let (status, body) = post(&h.app, Some(&session_id), "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Invalid JSON-RPC message"));
    }

    #[tokio::test]
    async fn test_post_acknowledges_without_result() {
        let h = harness();
        let (session_id, _stream) = open_sse(&h.app).await;
        let (status, body) = post(
            &h.app,
            Some(&session_id),
            tool_call(1, "query_database", json!({"sql": "SELECT 1"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "Accepted");
    }
}

mod push_channel_tests {
    use super::*;

    #[tokio::test]
    async fn test_select_one_delivered_on_stream() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;
        post(
            &h.app,
            Some(&session_id),
            tool_call(1, "query_database", json!({"sql": "SELECT 1"})),
        )
        .await;

        let response = next_message(&mut stream).await;
        assert_eq!(response["id"], 1);
        assert!(response["result"].get("isError").is_none());
        assert!(response["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains(r#"[{"?column?":1}]"#));
        assert_eq!(response["result"]["structuredContent"], json!([{"?column?": 1}]));
    }

    #[tokio::test]
    async fn test_drop_table_never_reaches_store() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;
        post(
            &h.app,
            Some(&session_id),
            tool_call(1, "query_database", json!({"sql": "DROP TABLE users"})),
        )
        .await;

        let response = next_message(&mut stream).await;
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_tables() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;
        post(&h.app, Some(&session_id), tool_call(5, "list_tables", json!({}))).await;

        let response = next_message(&mut stream).await;
        assert_eq!(response["result"]["content"][0]["text"], "a, b");
    }

    #[tokio::test]
    async fn test_store_error_keeps_session_open() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;

        post(
            &h.app,
            Some(&session_id),
            tool_call(1, "query_database", json!({"sql": "SELEC 1"})),
        )
        .await;
        let failed = next_message(&mut stream).await;
        assert_eq!(failed["result"]["isError"], true);
        assert!(failed["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("syntax error"));

        let (status, _) = post(
            &h.app,
            Some(&session_id),
            tool_call(2, "query_database", json!({"sql": "SELECT 1"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(next_message(&mut stream).await["id"], 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_tool_error() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;
        let (status, _) = post(&h.app, Some(&session_id), tool_call(1, "rm_rf", json!({}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = next_message(&mut stream).await;
        assert_eq!(response["result"]["isError"], true);
        assert!(response["error"].is_null());
    }

    #[tokio::test]
    async fn test_tool_call_without_name_is_invalid_params() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;
        let body = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {}});
        let (status, _) = post(&h.app, Some(&session_id), body.to_string()).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = next_message(&mut stream).await;
        assert_eq!(response["id"], 3);
        assert_eq!(response["error"]["code"], -32602);
        assert_eq!(h.store.calls(), 0);
    }
}

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_clients_do_not_see_each_others_results() {
        let h = harness();
        let (id_a, mut stream_a) = open_sse(&h.app).await;
        let (id_b, mut stream_b) = open_sse(&h.app).await;
        assert_ne!(id_a, id_b);

        post(&h.app, Some(&id_b), tool_call(1, "echo_tool", json!({"message": "for b"}))).await;
        post(&h.app, Some(&id_a), tool_call(1, "echo_tool", json!({"message": "for a"}))).await;

        let a = next_message(&mut stream_a).await;
        let b = next_message(&mut stream_b).await;
        assert_eq!(a["result"]["content"][0]["text"], "Echo: for a");
        assert_eq!(b["result"]["content"][0]["text"], "Echo: for b");
    }

    #[tokio::test]
    async fn test_disconnect_closes_session() {
        let h = harness();
        let (session_id, stream) = open_sse(&h.app).await;
        assert_eq!(h.dispatcher.transport().session_count(), 1);

        drop(stream);
        assert_eq!(h.dispatcher.transport().session_count(), 0);

        let (status, body) = post(&h.app, Some(&session_id), tool_call(1, "list_tables", json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "No active session");
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let h = harness();
        let (session_id, mut stream) = open_sse(&h.app).await;

        let initialize = json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test-client", "version": "1.0.0"},
                "capabilities": {}
            }
        });
        let (status, _) = post(&h.app, Some(&session_id), initialize.to_string()).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = next_message(&mut stream).await;
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }
}
