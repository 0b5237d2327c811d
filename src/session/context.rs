//! Per-message identity binding.
//!
//! A [`CallContext`] is built once from the session when a message arrives and
//! handed down by value. Tool bodies read the tenant from it and never from the
//! payload, and since nothing is stored in task- or thread-local state, two
//! messages running concurrently cannot observe each other's identity.

use std::future::Future;

use tracing::Instrument;

use super::registry::{Session, SessionId};
use crate::notes::types::Tenant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    tenant: Tenant,
    session_id: Option<SessionId>,
}

impl CallContext {
    /// A context not tied to any session (REST calls, tests).
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            session_id: None,
        }
    }

    pub fn for_session(session: &Session) -> Self {
        Self {
            tenant: session.tenant(),
            session_id: Some(session.id().clone()),
        }
    }

    pub fn current_identity(&self) -> Tenant {
        self.tenant
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn span(&self) -> tracing::Span {
        let session_id = self.session_id.as_ref().map_or("-", SessionId::as_str);
        tracing::info_span!("call", session_id = %session_id, tenant = %self.tenant)
    }
}

/// Run `f` with `ctx` bound, inside a span carrying the session and tenant.
pub async fn run_with_identity<F, Fut, T>(ctx: CallContext, f: F) -> T
where
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = T>,
{
    let span = ctx.span();
    f(ctx).instrument(span).await
}
