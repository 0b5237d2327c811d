//! Account endpoints: register, login and logout through the `user_id`
//! cookie, renaming oneself, and admin management of other users.
//!
//! The oldest admin is the super admin. Only it may grant or revoke admin
//! rights or change its own account, and it can never be deleted.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::api::{ApiError, Caller};
use super::AppState;
use crate::error::StoreError;
use crate::identity::USER_COOKIE;
use crate::notes::types::{Tenant, User, UserId};
use crate::notes::users;

fn session_cookie(user: &User, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((USER_COOKIE, user.id.to_string()))
        .path("/")
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(max_age)
        .build()
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} required")))
}

#[derive(Debug, Serialize)]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: User,
    pub is_super_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: Option<String>,
}

/// `POST /api/users/register`
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, CookieJar, Json<User>), ApiError> {
    let username = required(body.username, "username")?;
    let user = state
        .pool
        .run(move |conn| users::create_user(conn, &username, false))
        .await?;

    let jar = jar.add(session_cookie(&user, state.session_max_age));
    Ok((StatusCode::CREATED, jar, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub username: Option<String>,
    pub api_key: Option<String>,
}

/// `POST /api/users/login`. The API key doubles as the login secret.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<User>), ApiError> {
    let username = required(body.username, "username")?;
    let api_key = required(body.api_key, "api_key")?;

    let user = state
        .pool
        .run(move |conn| users::get_user_by_username(conn, &username))
        .await?
        .filter(|user| user.api_key == api_key.trim())
        .ok_or(ApiError::Unauthorized)?;

    tracing::info!(user_id = user.id, "user logged in");
    let jar = jar.add(session_cookie(&user, state.session_max_age));
    Ok((jar, Json(user)))
}

/// `POST /api/users/logout`
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar.remove(Cookie::build(USER_COOKIE).path("/"));
    (jar, Json(json!({ "ok": true })))
}

/// `GET /api/users/current`. `null` for anonymous callers.
pub async fn current(
    State(state): State<AppState>,
    Caller(tenant): Caller,
) -> Result<Json<Option<CurrentUser>>, ApiError> {
    let Tenant::User(id) = tenant else {
        return Ok(Json(None));
    };

    let current = state
        .pool
        .run(move |conn| {
            let Some(user) = users::get_user_by_id(conn, id)? else {
                return Ok(None);
            };
            let is_super_admin = users::super_admin_id(conn)? == Some(user.id);
            Ok(Some(CurrentUser { user, is_super_admin }))
        })
        .await?;
    Ok(Json(current))
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub username: Option<String>,
}

/// `PUT /api/users/current`
pub async fn update_current(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Json(body): Json<RenameBody>,
) -> Result<Json<CurrentUser>, ApiError> {
    let Tenant::User(id) = tenant else {
        return Err(ApiError::Unauthorized);
    };
    let username = body
        .username
        .ok_or_else(|| ApiError::BadRequest("No updates provided".into()))?;

    let current = state
        .pool
        .run(move |conn| {
            let user = users::rename_user(conn, id, &username)?;
            let is_super_admin = users::super_admin_id(conn)? == Some(user.id);
            Ok(CurrentUser { user, is_super_admin })
        })
        .await?;
    Ok(Json(current))
}

/// The caller's id if it is an admin, along with the current super admin.
async fn require_admin(state: &AppState, tenant: Tenant) -> Result<(UserId, Option<UserId>), ApiError> {
    let Tenant::User(caller) = tenant else {
        return Err(ApiError::Unauthorized);
    };

    let (is_admin, super_admin) = state
        .pool
        .run(move |conn| {
            let is_admin = users::get_user_by_id(conn, caller)?.is_some_and(|u| u.is_admin);
            Ok((is_admin, users::super_admin_id(conn)?))
        })
        .await?;

    if !is_admin {
        return Err(ApiError::Forbidden("Access denied. Admin only.".into()));
    }
    Ok((caller, super_admin))
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateBody {
    pub username: Option<String>,
    pub is_admin: Option<bool>,
}

/// `PUT /api/admin/users/{id}`
pub async fn admin_update(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(target): Path<UserId>,
    Json(body): Json<AdminUpdateBody>,
) -> Result<Json<User>, ApiError> {
    let (caller, super_admin) = require_admin(&state, tenant).await?;
    let target_is_super = super_admin == Some(target);

    if target_is_super && caller != target {
        return Err(ApiError::Forbidden(
            "Only the super admin can modify their own account.".into(),
        ));
    }

    let mut is_admin = body.is_admin;
    if let Some(flag) = is_admin {
        if super_admin != Some(caller) {
            return Err(ApiError::Forbidden(
                "Only the super admin can manage admin privileges.".into(),
            ));
        }
        if target_is_super {
            if !flag {
                return Err(ApiError::BadRequest(
                    "The super admin cannot remove their own admin privileges.".into(),
                ));
            }
            is_admin = None;
        }
    }

    let username = body.username;
    let user = state
        .pool
        .run(move |conn| {
            if let Some(name) = username {
                users::rename_user(conn, target, &name)?;
            }
            if let Some(flag) = is_admin {
                users::set_admin(conn, target, flag)?;
            }
            users::get_user_by_id(conn, target)?.ok_or_else(|| StoreError::UserNotFound(target.to_string()))
        })
        .await?;

    tracing::info!(admin = caller, user_id = target, "user updated by admin");
    Ok(Json(user))
}

/// `DELETE /api/admin/users/{id}`. The user's notes go with it and its live
/// MCP sessions are closed.
pub async fn admin_delete(
    State(state): State<AppState>,
    Caller(tenant): Caller,
    Path(target): Path<UserId>,
) -> Result<Json<Value>, ApiError> {
    let (caller, super_admin) = require_admin(&state, tenant).await?;

    if target == caller {
        return Err(ApiError::BadRequest("Cannot delete yourself".into()));
    }
    if super_admin == Some(target) {
        return Err(ApiError::Forbidden("The super admin cannot be deleted.".into()));
    }

    let deleted_notes = state
        .pool
        .run(move |conn| users::delete_user(conn, target))
        .await?;
    let closed_sessions = state.connections.close_tenant(Tenant::User(target));

    tracing::info!(admin = caller, user_id = target, deleted_notes, closed_sessions, "user deleted by admin");
    Ok(Json(json!({
        "success": true,
        "deletedNotes": deleted_notes,
        "closedSessions": closed_sessions,
    })))
}
