//! MCP dispatcher
//!
//! Binds the session transport to the tool handler. Requests are accepted on
//! the request channel and answered on the session's push channel.

use std::sync::Arc;

use crate::error::RoutingError;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;
use crate::transport::session::{InboundReceiver, OpenedSession, PushReceiver};
use crate::transport::{Inbound, PushEvent, SessionId, SessionTransport};

/// MCP Server info
const SERVER_NAME: &str = "sql-bridge";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Routes request-channel messages to tools and pushes the answers back
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<SessionTransport>,
    tool_handler: Arc<ToolHandler>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(transport: Arc<SessionTransport>, tool_handler: ToolHandler) -> Self {
        Self {
            transport,
            tool_handler: Arc::new(tool_handler),
        }
    }

    pub fn transport(&self) -> &Arc<SessionTransport> {
        &self.transport
    }

    /// Open a session and start the worker that answers its requests.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open_session(&self) -> (SessionId, PushReceiver) {
        let OpenedSession { id, push, inbound } = self.transport.open_session();

        let worker = self.clone();
        let worker_id = id.clone();
        tokio::spawn(async move { worker.run_session(worker_id, inbound).await });

        (id, push)
    }

    /// Accept a raw request-channel message. Success only means the message
    /// was queued; its answer arrives on the push channel.
    pub fn handle_inbound(&self, session_id: &SessionId, raw: &str) -> Result<(), RoutingError> {
        let inbound = self.transport.route_inbound(session_id, raw).map_err(|e| {
            tracing::warn!(session_id = %session_id, "Rejected inbound message: {}", e);
            e
        })?;
        self.transport.enqueue(session_id, inbound)
    }

    /// Drain one session's queue in order until the session closes
    async fn run_session(self, session_id: SessionId, mut inbound: InboundReceiver) {
        while let Some(message) = inbound.recv().await {
            let Some(response) = self.handle_message(message).await else {
                continue;
            };

            let payload = match serde_json::to_string(&response) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(session_id = %session_id, "Failed to serialize response: {}", e);
                    continue;
                }
            };

            if let Err(e) = self
                .transport
                .push_to_session(&session_id, PushEvent::Message(payload))
            {
                tracing::debug!(session_id = %session_id, "Dropping response: {}", e);
            }
        }
        tracing::debug!(session_id = %session_id, "Session worker stopped");
    }

    /// Handle one accepted message. Notifications produce no response.
    async fn handle_message(&self, message: Inbound) -> Option<JsonRpcResponse> {
        match message {
            Inbound::Invocation(call) => {
                let Some(id) = call.request_id else {
                    tracing::warn!(tool = %call.tool_name, "Ignoring tools/call sent as a notification");
                    return None;
                };
                tracing::info!(session_id = %call.session_id, tool = %call.tool_name, "Calling tool");

                let result = self.tool_handler.call_tool(&call.tool_name, call.arguments).await;
                Some(match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
                })
            }
            Inbound::Control(request) => self.handle_control(request),
            Inbound::Rejected { request_id, error } => {
                tracing::warn!(code = error.code, "Rejecting request: {}", error.message);
                Some(JsonRpcResponse::error(request_id, error))
            }
        }
    }

    fn handle_control(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        let result = match request.method.as_str() {
            methods::INITIALIZE => serde_json::to_value(self.initialize_result()),
            methods::PING => Ok(serde_json::json!({})),
            methods::LIST_TOOLS => serde_json::to_value(ListToolsResult {
                tools: self.tool_handler.list_tools(),
            }),
            methods::INITIALIZED => return None,
            _ => {
                return Some(JsonRpcResponse::error(
                    id,
                    JsonRpcError::method_not_found(&request.method),
                ))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        })
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
        }
    }
}
