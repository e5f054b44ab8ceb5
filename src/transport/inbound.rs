//! Decoding of request-channel messages

use serde_json::Value;

use crate::error::RoutingError;
use crate::mcp::types::{methods, CallToolParams, JsonRpcError, JsonRpcRequest, RequestId};
use crate::transport::session::SessionId;

/// A single tool call, alive for the duration of one dispatch
#[derive(Debug, Clone)]
pub struct ToolInvocationRequest {
    pub session_id: SessionId,
    pub request_id: Option<RequestId>,
    pub tool_name: String,
    pub arguments: Value,
}

/// A message accepted for a session
#[derive(Debug, Clone)]
pub enum Inbound {
    /// `tools/call`
    Invocation(ToolInvocationRequest),
    /// Any other JSON-RPC request or notification
    Control(JsonRpcRequest),
    /// A request that is well-formed JSON-RPC but cannot be served. It is
    /// answered with `error` on the push channel.
    Rejected {
        request_id: RequestId,
        error: JsonRpcError,
    },
}

impl Inbound {
    /// Parse a raw JSON-RPC body posted for `session_id`
    pub fn parse(session_id: &SessionId, raw: &str) -> Result<Self, RoutingError> {
        let request: JsonRpcRequest =
            serde_json::from_str(raw).map_err(|e| RoutingError::InvalidMessage {
                message: format!("Invalid JSON-RPC message: {}", e),
            })?;

        if request.method != methods::CALL_TOOL {
            return Ok(Inbound::Control(request));
        }

        let params: CallToolParams =
            match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                Ok(params) => params,
                Err(e) => {
                    let message = format!("Invalid tool parameters: {}", e);
                    // Without an id there is no one to answer, so refuse it here.
                    return match request.id {
                        Some(request_id) => Ok(Inbound::Rejected {
                            request_id,
                            error: JsonRpcError::invalid_params(message),
                        }),
                        None => Err(RoutingError::InvalidMessage { message }),
                    };
                }
            };

        Ok(Inbound::Invocation(ToolInvocationRequest {
            session_id: session_id.clone(),
            request_id: request.id,
            tool_name: params.name,
            arguments: params.arguments,
        }))
    }
}
