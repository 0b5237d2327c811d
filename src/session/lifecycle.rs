//! Per-connection state machine: open, heartbeat, teardown.
//!
//! Every path that ends a connection (peer close, write failure, explicit
//! close, shutdown) funnels into [`ConnectionManager::teardown`]. The session's
//! compare-and-set guard lets exactly one of them run; the rest are no-ops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::{Session, SessionId, SessionRegistry};
use super::transport::{Frame, Transport};
use crate::error::TransportError;
use crate::notes::types::Tenant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Established,
    Heartbeating,
    Idle,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Connecting, Established) => true,
            (Established, Heartbeating) => true,
            (Heartbeating, Idle) | (Idle, Heartbeating) => true,
            (Closing, Closed) => true,
            (Closing | Closed, _) => false,
            (_, Closing) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    PeerClosed,
    WriteFailed,
    Explicit,
    Shutdown,
}

impl TeardownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::WriteFailed => "write_failed",
            Self::Explicit => "explicit",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Grace period before the first beat, so it never interleaves with the handshake.
    pub start_delay: Duration,
    pub interval: Duration,
    /// Consecutive beats that may be skipped on a full buffer before the
    /// session is torn down as stalled.
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(2000),
            interval: Duration::from_millis(15000),
            max_missed: 3,
        }
    }
}

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens connections and owns every way they end.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    registry: SessionRegistry,
    heartbeat: HeartbeatConfig,
    channel_capacity: usize,
    write_timeout: Duration,
    message_path: Arc<str>,
    teardowns: Arc<AtomicU64>,
}

impl ConnectionManager {
    pub fn new(
        registry: SessionRegistry,
        heartbeat: HeartbeatConfig,
        channel_capacity: usize,
        message_path: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            heartbeat,
            channel_capacity,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            message_path: Arc::from(message_path.into()),
            teardowns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bound on how long [`deliver`](Self::deliver) waits for buffer space.
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn message_path(&self) -> &str {
        &self.message_path
    }

    /// Sessions torn down since this manager was created.
    pub fn teardown_count(&self) -> u64 {
        self.teardowns.load(Ordering::Relaxed)
    }

    /// Register a session for `tenant`, queue the endpoint handshake, and start
    /// its heartbeat. The returned receiver feeds the SSE response body.
    ///
    /// The session stays `Connecting` until the body takes the endpoint frame
    /// off the channel (see [`StreamGuard::observe`]).
    pub fn open(&self, tenant: Tenant) -> Result<(Arc<Session>, mpsc::Receiver<Frame>), TransportError> {
        let (transport, rx) = Transport::channel(self.channel_capacity);
        let session = self.registry.create(tenant, transport);

        let endpoint = format!("{}?sessionId={}", self.message_path, session.id());
        if !matches!(session.transport().try_send(Frame::Endpoint(endpoint)), Ok(true)) {
            self.teardown(&session, TeardownReason::WriteFailed);
            return Err(TransportError::Closed);
        }

        tracing::info!(session_id = %session.id(), tenant = %tenant, "session opened");
        self.spawn_heartbeat(Arc::clone(&session));
        Ok((session, rx))
    }

    /// Write a frame to a session's stream. A failed write, or one that finds
    /// no buffer space within the write timeout, tears the session down.
    pub async fn deliver(&self, session: &Session, frame: Frame) -> Result<(), TransportError> {
        let result = tokio::select! {
            result = tokio::time::timeout(self.write_timeout, session.send(frame)) => {
                result.unwrap_or_else(|_| {
                    tracing::warn!(session_id = %session.id(), "peer stopped reading, write timed out");
                    Err(TransportError::Closed)
                })
            }
            _ = session.cancellation().cancelled() => Err(TransportError::Closed),
        };
        if result.is_err() {
            self.teardown(session, TeardownReason::WriteFailed);
        }
        result
    }

    /// Tear a session down. Returns `false` if another path already did.
    pub fn teardown(&self, session: &Session, reason: TeardownReason) -> bool {
        if !session.begin_teardown() {
            return false;
        }

        session.set_state(ConnectionState::Closing);
        session.cancellation().cancel();
        self.registry.remove(session.id());
        session.set_state(ConnectionState::Closed);
        self.teardowns.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            session_id = %session.id(),
            tenant = %session.tenant(),
            reason = %reason,
            "session closed"
        );
        true
    }

    /// Explicitly close a session by id.
    pub fn close(&self, id: &SessionId) -> bool {
        match self.registry.get(id) {
            Some(session) => self.teardown(&session, TeardownReason::Explicit),
            None => false,
        }
    }

    /// Close every live session bound to `tenant`.
    pub fn close_tenant(&self, tenant: Tenant) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|s| s.tenant() == tenant)
            .filter(|s| self.teardown(s, TeardownReason::Explicit))
            .count()
    }

    /// Tear down every live session. Returns how many this call closed.
    pub fn shutdown(&self) -> usize {
        let sessions = self.registry.snapshot();
        let closed = sessions
            .iter()
            .filter(|s| self.teardown(s, TeardownReason::Shutdown))
            .count();
        tracing::info!(closed, "all sessions torn down");
        closed
    }

    /// Guard that tears the session down when the response body is dropped.
    pub fn stream_guard(&self, session: Arc<Session>) -> StreamGuard {
        StreamGuard {
            manager: self.clone(),
            session,
        }
    }

    fn spawn_heartbeat(&self, session: Arc<Session>) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.run_heartbeat(session).await })
    }

    /// Beat until the session is cancelled or a write fails. Never retries.
    /// A beat skipped on a full buffer is tolerated `max_missed - 1` times in a
    /// row; the next one marks the peer as stalled.
    pub(crate) async fn run_heartbeat(&self, session: Arc<Session>) {
        let cancel = session.cancellation().clone();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.heartbeat.start_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.heartbeat.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut missed = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            session.set_state(ConnectionState::Heartbeating);
            match session.transport().try_send(Frame::Heartbeat) {
                Ok(true) => missed = 0,
                Ok(false) => {
                    missed += 1;
                    if missed >= self.heartbeat.max_missed {
                        tracing::warn!(session_id = %session.id(), missed, "peer stalled, closing stream");
                        self.teardown(&session, TeardownReason::WriteFailed);
                        break;
                    }
                    tracing::debug!(session_id = %session.id(), missed, "stream backlogged, skipping heartbeat");
                }
                Err(_) => {
                    tracing::debug!(session_id = %session.id(), "heartbeat write failed");
                    self.teardown(&session, TeardownReason::WriteFailed);
                    break;
                }
            }
            session.set_state(ConnectionState::Idle);
        }
    }
}

/// Held by the SSE response stream; dropping it means the peer went away.
pub struct StreamGuard {
    manager: ConnectionManager,
    session: Arc<Session>,
}

impl StreamGuard {
    /// Called for each frame the response body takes off the channel. The
    /// endpoint frame leaving the channel is what establishes the session.
    pub fn observe(&self, frame: &Frame) {
        if matches!(frame, Frame::Endpoint(_)) {
            self.session.set_state(ConnectionState::Established);
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.manager.teardown(&self.session, TeardownReason::PeerClosed);
    }
}
