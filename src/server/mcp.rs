//! SSE transport for MCP: one long-lived `GET` stream per session, and a
//! `POST` endpoint whose responses are written back onto that stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use super::rpc::{parse_error_body, IncomingMessage};
use super::AppState;
use crate::identity::Credentials;
use crate::session::{run_with_identity, CallContext, Frame, SessionId};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// `GET /mcp`
pub async fn connect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    open_stream(state, Credentials::from_headers(&headers)).await
}

/// `GET /mcp/{api_key}`
pub async fn connect_with_key(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
    headers: HeaderMap,
) -> Response {
    let credentials = Credentials::from_headers(&headers).with_path_key(Some(api_key));
    open_stream(state, credentials).await
}

async fn open_stream(state: AppState, credentials: Credentials) -> Response {
    let tenant = state.identity.resolve(&credentials).await;

    let (session, rx) = match state.connections.open(tenant) {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!(error = %e, "failed to open session");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    // Dropping the body (peer gone) drops the guard, which tears the session down.
    let guard = state.connections.stream_guard(Arc::clone(&session));
    let stream = ReceiverStream::new(rx)
        .take_until(session.cancellation().clone().cancelled_owned())
        .map(move |frame| {
            guard.observe(&frame);
            Ok::<_, Infallible>(frame.into_event())
        });

    (
        [(X_ACCEL_BUFFERING, HeaderValue::from_static("no"))],
        Sse::new(stream),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// `POST <message_path>?sessionId=...`
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let session = query
        .session_id
        .map(SessionId::from)
        .and_then(|id| state.connections.registry().get(&id));
    let Some(session) = session else {
        return (StatusCode::NOT_FOUND, "Session not found").into_response();
    };

    let message: IncomingMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(session_id = %session.id(), error = %e, "malformed message");
            return (StatusCode::BAD_REQUEST, Json(parse_error_body(e))).into_response();
        }
    };

    let handler = state.mcp.clone();
    let ctx = CallContext::for_session(&session);
    let response = run_with_identity(ctx, |ctx| async move { handler.handle(&ctx, message).await }).await;

    if let Some(response) = response {
        match serde_json::to_string(&response) {
            Ok(json) => {
                if state
                    .connections
                    .deliver(&session, Frame::Message(json))
                    .await
                    .is_err()
                {
                    tracing::debug!(session_id = %session.id(), "stream closed, response discarded");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize response"),
        }
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}
