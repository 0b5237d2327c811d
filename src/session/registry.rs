//! In-memory session table shared by every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::lifecycle::ConnectionState;
use super::transport::{Frame, Transport};
use crate::error::TransportError;
use crate::notes::types::Tenant;

/// Opaque, unguessable correlation token between a stream and posted messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One registered connection. The tenant is fixed at construction.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    tenant: Tenant,
    transport: Transport,
    created_at: DateTime<Utc>,
    state: Mutex<ConnectionState>,
    torn_down: AtomicBool,
    cancel: CancellationToken,
}

impl Session {
    fn new(id: SessionId, tenant: Tenant, transport: Transport) -> Self {
        Self {
            id,
            tenant,
            transport,
            created_at: Utc::now(),
            state: Mutex::new(ConnectionState::Connecting),
            torn_down: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn tenant(&self) -> Tenant {
        self.tenant
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Cancelled exactly once, when teardown begins.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` if the state machine allows it. Returns whether it moved.
    pub fn set_state(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(next) {
            *state = next;
            true
        } else {
            false
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Claim the right to tear this session down. Only the first caller wins.
    pub(crate) fn begin_teardown(&self) -> bool {
        self.torn_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Write a frame unless the session is already being torn down.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_torn_down() {
            return Err(TransportError::Closed);
        }
        self.transport.send(frame).await
    }
}

/// Lock-guarded map of live sessions.
///
/// Entries are fully built before insertion and the lock is never held across
/// an `.await`, so a lookup sees either a complete session or nothing.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for `tenant` writing to `transport`.
    pub fn create(&self, tenant: Tenant, transport: Transport) -> Arc<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let session = Arc::new(Session::new(id.clone(), tenant, transport));
        sessions.insert(id, Arc::clone(&session));
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Remove a session. Removing an absent id is a no-op returning `None`.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of every live session.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
