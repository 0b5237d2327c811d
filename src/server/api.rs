//! REST endpoints for the human-facing client.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;

use super::AppState;
use crate::error::StoreError;
use crate::identity::Credentials;
use crate::notes::store::{self, now_timestamp};
use crate::notes::types::{ImportedNote, Note, NoteId, NoteUpdate, Tenant};
use crate::notes::users;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Store(StoreError::NotFound(_) | StoreError::UserNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Database(_) | StoreError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// The tenant behind a REST request, resolved from its header and cookie.
pub struct Caller(pub Tenant);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = Credentials::from_headers(&parts.headers);
        Ok(Caller(state.identity.resolve(&credentials).await))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub keyword: Option<String>,
    pub limit: Option<i64>,
    pub updated_since: Option<String>,
}

/// `GET /api/notes`
pub async fn list_notes(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let keyword = query
        .keyword
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty());

    let notes = if keyword.is_some() || query.limit.is_some() {
        let limit = state.limits.clamp(query.limit);
        state
            .pool
            .run(move |conn| store::search_notes(conn, tenant, keyword.as_deref(), limit))
            .await?
    } else if let Some(since) = query.updated_since.filter(|s| !s.trim().is_empty()) {
        state
            .pool
            .run(move |conn| store::list_updated_since(conn, tenant, since.trim()))
            .await?
    } else {
        state.pool.run(move |conn| store::list_notes(conn, tenant)).await?
    };
    Ok(Json(notes))
}

/// `GET /api/notes/{id}`
pub async fn get_note(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(id): Path<NoteId>,
) -> Result<Json<Note>, ApiError> {
    let note = state.pool.run(move |conn| store::get_note(conn, tenant, id)).await?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
pub struct CreateNoteBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// `POST /api/notes`
pub async fn create_note(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Json(body): Json<CreateNoteBody>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let title = body
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("title required".into()))?;
    let content = body
        .content
        .ok_or_else(|| ApiError::BadRequest("content required".into()))?;

    let note = state
        .pool
        .run(move |conn| store::create_note(conn, tenant, &title, &content))
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `PUT /api/notes/{id}`
pub async fn update_note(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(id): Path<NoteId>,
    Json(update): Json<NoteUpdate>,
) -> Result<Json<Note>, ApiError> {
    let note = state
        .pool
        .run(move |conn| store::update_note(conn, tenant, id, &update))
        .await?;
    Ok(Json(note))
}

/// `POST /api/notes/{id}/toggle-favorite`
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(id): Path<NoteId>,
) -> Result<Json<Note>, ApiError> {
    let note = state
        .pool
        .run(move |conn| store::toggle_favorite(conn, tenant, id))
        .await?;
    Ok(Json(note))
}

/// `DELETE /api/notes/{id}`
pub async fn delete_note(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(id): Path<NoteId>,
) -> Result<Json<Note>, ApiError> {
    let note = state
        .pool
        .run(move |conn| store::delete_note(conn, tenant, id))
        .await?;
    Ok(Json(note))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub username: String,
    pub exported_at: String,
    pub notes: Vec<Note>,
}

/// `GET /api/notes/export`. Anonymous callers have nothing to export.
pub async fn export_notes(
    State(state): State<AppState>,
    Caller(tenant): Caller,
) -> Result<Json<ExportDocument>, ApiError> {
    let Tenant::User(user_id) = tenant else {
        return Err(ApiError::Unauthorized);
    };

    let doc = state
        .pool
        .run(move |conn| {
            let user = users::get_user_by_id(conn, user_id)?
                .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
            Ok(ExportDocument {
                version: "1.0".into(),
                username: user.username,
                exported_at: now_timestamp(),
                notes: store::list_notes(conn, tenant)?,
            })
        })
        .await?;
    Ok(Json(doc))
}

#[derive(Debug, Deserialize)]
pub struct ImportBody {
    pub notes: Vec<serde_json::Value>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// `POST /api/notes/import`. `mode: "replace"` clears the caller's notes first.
pub async fn import_notes(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Json(body): Json<ImportBody>,
) -> Result<Json<ImportSummary>, ApiError> {
    if tenant.is_anonymous() {
        return Err(ApiError::Unauthorized);
    }
    let replace = body.mode.as_deref() == Some("replace");

    let summary = state
        .pool
        .run(move |conn| {
            let tx = conn.transaction()?;
            if replace {
                let removed = store::delete_all_for_tenant(&tx, tenant)?;
                tracing::info!(tenant = %tenant, removed, "cleared notes before import");
            }

            let mut count = 0;
            let mut errors = Vec::new();
            for raw in body.notes {
                match serde_json::from_value::<ImportedNote>(raw) {
                    Ok(note) => {
                        store::import_note(&tx, tenant, &note)?;
                        count += 1;
                    }
                    Err(_) => errors.push("Invalid note format: missing title or content".to_string()),
                }
            }
            if count == 0 && !errors.is_empty() {
                return Err(StoreError::Validation(format!("Import failed: {}", errors.join("; "))));
            }
            tx.commit()?;
            Ok(ImportSummary {
                success: true,
                count,
                errors,
            })
        })
        .await?;

    Ok(Json(summary))
}

/// `GET /api/system/status`
pub async fn system_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let user_count = state.pool.run(|conn| users::count_users(conn)).await?;
    Ok(Json(json!({
        "userCount": user_count,
        "activeSessions": state.connections.registry().len(),
    })))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
