//! Session transport
//!
//! Push channels (`GET /sse`) and the request channel (`POST /messages`),
//! correlated by session id.

pub mod http;
pub mod inbound;
pub mod session;

pub use inbound::{Inbound, ToolInvocationRequest};
pub use session::{PushEvent, SessionId, SessionState, SessionTransport};
