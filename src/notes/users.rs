//! The tenant store: users and their API keys.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::store::now_timestamp;
use super::types::{User, UserId, UserSummary};
use crate::error::StoreError;

const USER_COLUMNS: &str = "id, username, api_key, created_at, is_admin";

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 32;

/// A fresh opaque API key.
pub fn generate_api_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        api_key: row.get(2)?,
        created_at: row.get(3)?,
        is_admin: row.get::<_, i64>(4)? != 0,
    })
}

fn validate_username(username: &str) -> Result<&str, StoreError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(StoreError::Validation("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(StoreError::Validation(format!(
            "username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }
    Ok(username)
}

/// Create a user with a new API key. The first user ever created is an admin.
pub fn create_user(conn: &mut Connection, username: &str, admin: bool) -> Result<User, StoreError> {
    let username = validate_username(username)?;
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    if get_user_by_username(&tx, username)?.is_some() {
        return Err(StoreError::Conflict("Username already exists.".into()));
    }

    let first_user = count_users(&tx)? == 0;
    tx.execute(
        "INSERT INTO users (username, api_key, created_at, is_admin) VALUES (?1, ?2, ?3, ?4)",
        params![
            username,
            generate_api_key(),
            now_timestamp(),
            (admin || first_user) as i64
        ],
    )?;
    let id = tx.last_insert_rowid();
    let user = get_user_by_id(&tx, id)?.ok_or_else(|| StoreError::UserNotFound(id.to_string()))?;
    tx.commit()?;

    tracing::info!(user_id = user.id, username = %user.username, admin = user.is_admin, "user created");
    Ok(user)
}

pub fn get_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()?)
}

pub fn get_user_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE api_key = ?1"),
            params![api_key],
            row_to_user,
        )
        .optional()?)
}

/// Case-insensitive lookup by username.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE"),
            params![username.trim()],
            row_to_user,
        )
        .optional()?)
}

/// Replace a user's API key. The old key stops resolving immediately.
pub fn rotate_api_key(conn: &Connection, username: &str) -> Result<User, StoreError> {
    let user = get_user_by_username(conn, username)?
        .ok_or_else(|| StoreError::UserNotFound(username.to_string()))?;
    conn.execute(
        "UPDATE users SET api_key = ?1 WHERE id = ?2",
        params![generate_api_key(), user.id],
    )?;
    get_user_by_id(conn, user.id)?.ok_or_else(|| StoreError::UserNotFound(username.to_string()))
}

/// Change a user's name. Fails with `Conflict` if another user already has it.
pub fn rename_user(conn: &mut Connection, id: UserId, username: &str) -> Result<User, StoreError> {
    let username = validate_username(username)?;
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

    let before = get_user_by_id(&tx, id)?.ok_or_else(|| StoreError::UserNotFound(id.to_string()))?;
    if get_user_by_username(&tx, username)?.is_some_and(|other| other.id != id) {
        return Err(StoreError::Conflict("Username already exists.".into()));
    }

    tx.execute("UPDATE users SET username = ?1 WHERE id = ?2", params![username, id])?;
    let user = get_user_by_id(&tx, id)?.ok_or_else(|| StoreError::UserNotFound(id.to_string()))?;
    tx.commit()?;

    tracing::info!(user_id = id, from = %before.username, to = %user.username, "user renamed");
    Ok(user)
}

pub fn set_admin(conn: &Connection, id: UserId, admin: bool) -> Result<User, StoreError> {
    let changed = conn.execute(
        "UPDATE users SET is_admin = ?1 WHERE id = ?2",
        params![admin as i64, id],
    )?;
    if changed == 0 {
        return Err(StoreError::UserNotFound(id.to_string()));
    }
    get_user_by_id(conn, id)?.ok_or_else(|| StoreError::UserNotFound(id.to_string()))
}

/// Delete a user together with every note it owns. Returns how many notes went.
pub fn delete_user(conn: &mut Connection, id: UserId) -> Result<u64, StoreError> {
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let notes = tx.execute("DELETE FROM notes WHERE user_id = ?1", params![id])?;
    if tx.execute("DELETE FROM users WHERE id = ?1", params![id])? == 0 {
        return Err(StoreError::UserNotFound(id.to_string()));
    }
    tx.commit()?;

    tracing::info!(user_id = id, notes, "user deleted");
    Ok(notes as u64)
}

/// The oldest admin. It can only be changed by itself and never deleted.
pub fn super_admin_id(conn: &Connection) -> Result<Option<UserId>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT id FROM users WHERE is_admin = 1 ORDER BY id ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn count_users(conn: &Connection) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// All users with their note counts, in creation order.
pub fn list_users(conn: &Connection) -> Result<Vec<UserSummary>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.api_key, u.created_at, u.is_admin, \
                COUNT(n.id), MAX(n.created_at) \
         FROM users u LEFT JOIN notes n ON n.user_id = u.id \
         GROUP BY u.id ORDER BY u.id ASC",
    )?;

    let users = stmt
        .query_map([], |row| {
            Ok(UserSummary {
                user: row_to_user(row)?,
                note_count: row.get::<_, i64>(5)? as u64,
                last_note_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
