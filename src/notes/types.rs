//! Core record types: [`Tenant`] (who owns a note), [`Note`], and [`User`].

use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::{Deserialize, Serialize};

/// Row id of a note.
pub type NoteId = i64;

/// Row id of a user; doubles as the concrete tenant identifier.
pub type UserId = i64;

/// The owner under which notes are scoped.
///
/// `Anonymous` is a real, queryable bucket (stored as `user_id IS NULL`), not an
/// error state. Resolved once per session and never taken from a tool payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tenant {
    #[default]
    Anonymous,
    User(UserId),
}

impl Tenant {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl From<Option<UserId>> for Tenant {
    fn from(id: Option<UserId>) -> Self {
        id.map_or(Self::Anonymous, Self::User)
    }
}

impl std::fmt::Display for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// Binds as `NULL` for the anonymous bucket, so `user_id IS ?` matches both cases.
impl ToSql for Tenant {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Anonymous => ToSqlOutput::Owned(Value::Null),
            Self::User(id) => ToSqlOutput::Owned(Value::Integer(*id)),
        })
    }
}

/// A note as seen by clients. The owning tenant is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// RFC 3339 creation timestamp (UTC, millisecond precision).
    pub created_at: String,
    /// RFC 3339 last-modification timestamp.
    pub updated_at: String,
    pub favorite: bool,
    #[serde(skip)]
    pub tenant: Tenant,
}

/// Partial update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub favorite: Option<bool>,
}

impl NoteUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.favorite.is_none()
    }
}

/// A note carried in from an export file, timestamps preserved when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedNote {
    pub title: String,
    pub content: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub favorite: bool,
}

/// A registered user. Its id is the tenant identifier of everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub api_key: String,
    pub created_at: String,
    pub is_admin: bool,
}

impl User {
    pub fn tenant(&self) -> Tenant {
        Tenant::User(self.id)
    }
}

/// Listing row for `user list`.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub note_count: u64,
    pub last_note_at: Option<String>,
}
