//! Credential → tenant resolution.
//!
//! Resolution never fails: an unknown key, a bogus cookie, or a store fault all
//! degrade to [`Tenant::Anonymous`], which is a real tenant bucket rather than
//! a rejection.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::db::Pool;
use crate::notes::types::{Tenant, UserId};
use crate::notes::users;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_COOKIE: &str = "user_id";

/// Whatever credentials a request carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub cookie_user_id: Option<String>,
}

impl Credentials {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Pull the `X-API-Key` header and the `user_id` cookie out of `headers`.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let api_key = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);

        let cookie_user_id = CookieJar::from_headers(headers)
            .get(USER_COOKIE)
            .map(|c| c.value().trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            api_key,
            cookie_user_id,
        }
    }

    /// A key carried in the URL path replaces any header key.
    pub fn with_path_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        self
    }
}

/// First four characters of a key, for logs.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…")
}

#[derive(Clone)]
pub struct IdentityResolver {
    pool: Pool,
}

impl IdentityResolver {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// API key first, then cookie, then anonymous.
    pub async fn resolve(&self, credentials: &Credentials) -> Tenant {
        if let Some(key) = &credentials.api_key {
            match self.lookup_key(key.clone()).await {
                Some(user_id) => {
                    tracing::debug!(key = %key_prefix(key), user_id, "resolved api key");
                    return Tenant::User(user_id);
                }
                None => tracing::info!(key = %key_prefix(key), "unrecognised api key"),
            }
        }

        if let Some(raw) = &credentials.cookie_user_id {
            match raw.parse::<UserId>() {
                Ok(id) if self.user_exists(id).await => return Tenant::User(id),
                Ok(id) => tracing::info!(user_id = id, "cookie names unknown user"),
                Err(_) => tracing::info!(cookie = %raw, "malformed user cookie"),
            }
        }

        Tenant::Anonymous
    }

    async fn lookup_key(&self, key: String) -> Option<UserId> {
        let found = self
            .pool
            .run(move |conn| users::get_user_by_api_key(conn, &key))
            .await;
        match found {
            Ok(user) => user.map(|u| u.id),
            Err(e) => {
                tracing::warn!(error = %e, "api key lookup failed, treating as anonymous");
                None
            }
        }
    }

    async fn user_exists(&self, id: UserId) -> bool {
        match self.pool.run(move |conn| users::get_user_by_id(conn, id)).await {
            Ok(user) => user.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, user_id = id, "user lookup failed, treating as anonymous");
                false
            }
        }
    }
}
