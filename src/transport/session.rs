//! Session table
//!
//! Every client that opens a push channel gets its own [`Session`], keyed by
//! a freshly generated [`SessionId`]. Request-channel messages name the
//! session they belong to and are routed through this table, so concurrent
//! clients never share a slot.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::RoutingError;
use crate::transport::inbound::Inbound;

/// Events buffered per push channel before the reader counts as stalled
pub const PUSH_QUEUE_CAPACITY: usize = 256;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    /// The push channel's reader is gone but the session is not torn down yet
    Closing,
    Closed,
}

/// Event written to a push channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Tells the client where to post its requests
    Endpoint(String),
    /// A serialized JSON-RPC message
    Message(String),
}

impl PushEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::Endpoint(_) => "endpoint",
            PushEvent::Message(_) => "message",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            PushEvent::Endpoint(data) | PushEvent::Message(data) => data,
        }
    }
}

pub type PushReceiver = mpsc::Receiver<PushEvent>;
pub type InboundReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Receiving ends handed out when a session opens
pub struct OpenedSession {
    pub id: SessionId,
    /// Events to forward to the client
    pub push: PushReceiver,
    /// Accepted requests, in acceptance order
    pub inbound: InboundReceiver,
}

struct Session {
    push: mpsc::Sender<PushEvent>,
    inbound: mpsc::UnboundedSender<Inbound>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
    state: SessionState,
}

/// Point-in-time view of a session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub state: SessionState,
    pub idle_for: Duration,
}

/// Process-wide table of live sessions
#[derive(Default)]
pub struct SessionTransport {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session and hand back its channels
    pub fn open_session(&self) -> OpenedSession {
        let id = SessionId::generate();
        let (push_tx, push_rx) = mpsc::channel(PUSH_QUEUE_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let session = Session {
            push: push_tx,
            inbound: inbound_tx,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            state: SessionState::Open,
        };
        self.write().insert(id.clone(), session);
        tracing::info!(session_id = %id, "Session opened");

        OpenedSession {
            id,
            push: push_rx,
            inbound: inbound_rx,
        }
    }

    /// Resolve the session a raw message belongs to and decode it
    pub fn route_inbound(&self, session_id: &SessionId, raw: &str) -> Result<Inbound, RoutingError> {
        {
            let mut sessions = self.write();
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| unknown_session(session_id))?;
            if session.state != SessionState::Open {
                return Err(session_closed(session_id));
            }
            session.last_activity = Instant::now();
        }

        Inbound::parse(session_id, raw)
    }

    /// Queue an accepted message for the session's worker
    pub fn enqueue(&self, session_id: &SessionId, inbound: Inbound) -> Result<(), RoutingError> {
        let sessions = self.read();
        let session = sessions
            .get(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        if session.state != SessionState::Open {
            return Err(session_closed(session_id));
        }
        session
            .inbound
            .send(inbound)
            .map_err(|_| session_closed(session_id))
    }

    /// Write an event to the session's push channel.
    ///
    /// A reader that lets [`PUSH_QUEUE_CAPACITY`] events pile up is cut off:
    /// the session is removed and its stream ends once the backlog drains.
    pub fn push_to_session(&self, session_id: &SessionId, event: PushEvent) -> Result<(), RoutingError> {
        let mut sessions = self.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| session_closed(session_id))?;
        if session.state != SessionState::Open {
            return Err(session_closed(session_id));
        }
        match session.push.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                session.state = SessionState::Closing;
                Err(session_closed(session_id))
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                sessions.remove(session_id);
                tracing::warn!(
                    session_id = %session_id,
                    capacity = PUSH_QUEUE_CAPACITY,
                    "Push channel stalled, closing session"
                );
                Err(session_closed(session_id))
            }
        }
    }

    /// Remove a session and release its channels. Returns false if it was
    /// already gone.
    pub fn close_session(&self, session_id: &SessionId) -> bool {
        let removed = self.write().remove(session_id);
        match removed {
            Some(mut session) => {
                let previous = std::mem::replace(&mut session.state, SessionState::Closed);
                tracing::info!(
                    session_id = %session_id,
                    ?previous,
                    age_secs = (Utc::now() - session.created_at).num_seconds(),
                    "Session closed"
                );
                true
            }
            None => false,
        }
    }

    /// Close every session without activity for at least `max_idle`
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let idle: Vec<SessionId> = self
            .read()
            .iter()
            .filter(|(_, session)| session.last_activity.elapsed() >= max_idle)
            .map(|(id, _)| id.clone())
            .collect();

        idle.iter().filter(|id| self.close_session(id)).count()
    }

    /// Periodically reap idle sessions
    pub fn spawn_idle_reaper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let transport = Arc::clone(self);
        let period = (max_idle / 2).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let reaped = transport.reap_idle(max_idle);
                if reaped > 0 {
                    tracing::info!(reaped, "Closed idle sessions");
                }
            }
        })
    }

    pub fn session_count(&self) -> usize {
        self.read().len()
    }

    pub fn session_info(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.read().get(session_id).map(|session| SessionInfo {
            id: session_id.clone(),
            created_at: session.created_at,
            state: session.state,
            idle_for: session.last_activity.elapsed(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Closes its session when dropped, i.e. when the client's stream goes away
pub struct SessionGuard {
    transport: Arc<SessionTransport>,
    session_id: SessionId,
}

impl SessionGuard {
    pub fn new(transport: Arc<SessionTransport>, session_id: SessionId) -> Self {
        Self {
            transport,
            session_id,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.transport.close_session(&self.session_id) {
            tracing::debug!(session_id = %self.session_id, "Client disconnected");
        }
    }
}

fn unknown_session(session_id: &SessionId) -> RoutingError {
    RoutingError::UnknownSession {
        session_id: session_id.to_string(),
    }
}

fn session_closed(session_id: &SessionId) -> RoutingError {
    RoutingError::SessionClosed {
        session_id: session_id.to_string(),
    }
}
