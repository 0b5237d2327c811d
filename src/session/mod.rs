//! Streaming sessions: the registry, the connection lifecycle, and the
//! per-message identity context.

pub mod context;
pub mod lifecycle;
pub mod registry;
pub mod transport;

pub use context::{run_with_identity, CallContext};
pub use lifecycle::{ConnectionManager, ConnectionState, HeartbeatConfig, TeardownReason};
pub use registry::{Session, SessionId, SessionRegistry};
pub use transport::{Frame, Transport};
