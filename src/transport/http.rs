//! HTTP surface of the transport
//!
//! `GET /sse` opens a push channel; `POST /messages?sessionId=<id>` carries
//! one JSON-RPC message for that session.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio_stream::Stream;
use tower_http::cors::CorsLayer;

use crate::error::RoutingError;
use crate::mcp::dispatcher::Dispatcher;
use crate::transport::session::{PushReceiver, SessionGuard};
use crate::transport::{PushEvent, SessionId};

/// Path of the push channel endpoint
pub const SSE_PATH: &str = "/sse";

/// Path of the request channel endpoint
pub const MESSAGES_PATH: &str = "/messages";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Build the application router
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route(SSE_PATH, get(open_stream))
        .route(MESSAGES_PATH, post(post_message))
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

async fn open_stream(State(dispatcher): State<Dispatcher>) -> Response {
    let (session_id, push) = dispatcher.open_session();
    let guard = SessionGuard::new(dispatcher.transport().clone(), session_id.clone());

    let endpoint = format!("{}?sessionId={}", MESSAGES_PATH, session_id);
    if let Err(e) = dispatcher
        .transport()
        .push_to_session(&session_id, PushEvent::Endpoint(endpoint))
    {
        tracing::error!(session_id = %session_id, "Could not announce endpoint: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to open session").into_response();
    }

    let stream = PushStream {
        push,
        _guard: guard,
    };
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(KEEP_ALIVE_INTERVAL)
                .text("keep-alive"),
        )
        .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageQuery {
    session_id: Option<String>,
}

async fn post_message(
    State(dispatcher): State<Dispatcher>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId parameter").into_response();
    };

    match dispatcher.handle_inbound(&SessionId::from(session_id), &body) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for RoutingError {
    fn into_response(self) -> Response {
        match self {
            RoutingError::UnknownSession { .. } | RoutingError::SessionClosed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "No active session").into_response()
            }
            RoutingError::InvalidMessage { message } => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
        }
    }
}

/// SSE body for one session. Dropping it (client gone) closes the session.
struct PushStream {
    push: PushReceiver,
    _guard: SessionGuard,
}

impl Stream for PushStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.push
            .poll_recv(cx)
            .map(|event| event.map(|event| Ok(to_sse_event(&event))))
    }
}

fn to_sse_event(event: &PushEvent) -> Event {
    Event::default().event(event.name()).data(event.data())
}
