//! Error types shared across the store, transport, and dispatch seams.
//!
//! The split that matters to callers is [`StoreError::is_domain`]: domain errors
//! (missing note, bad arguments) travel back to the agent as ordinary tool
//! results, while infrastructure faults surface as protocol-level failures.

use thiserror::Error;

use crate::notes::types::NoteId;

/// Failures from the note and user store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Note {0} not found")]
    NotFound(NoteId),

    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// `true` for business-level failures the caller can act on.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::UserNotFound(_) | Self::Validation(_) | Self::Conflict(_)
        )
    }
}

/// Failures writing to a live event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("event stream is closed")]
    Closed,
}

/// Failures from the tool dispatcher that cannot be expressed as a tool result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Infrastructure(StoreError),
}
