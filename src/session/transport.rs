//! The write half of a live SSE stream.

use axum::response::sse::Event;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::TransportError;

/// One unit written to an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// The handshake: where to post messages for this session.
    Endpoint(String),
    /// A serialized JSON-RPC message.
    Message(String),
    /// Keep-alive comment.
    Heartbeat,
}

impl Frame {
    pub fn into_event(self) -> Event {
        match self {
            Frame::Endpoint(url) => Event::default().event("endpoint").data(url),
            Frame::Message(json) => Event::default().event("message").data(json),
            Frame::Heartbeat => Event::default().comment(""),
        }
    }
}

/// Cloneable handle for pushing frames to one connection.
///
/// The receiving half is owned by the HTTP response body. When the peer goes
/// away axum drops the body, the receiver with it, and every later write here
/// fails with [`TransportError::Closed`].
#[derive(Debug, Clone)]
pub struct Transport {
    tx: mpsc::Sender<Frame>,
}

impl Transport {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a frame, waiting for buffer space.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }

    /// Queue a frame without waiting. `Ok(false)` means the buffer was full.
    pub fn try_send(&self, frame: Frame) -> Result<bool, TransportError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    /// Resolves once the receiving side is gone.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
