//! Tenant-scoped note storage.
//!
//! Every statement filters on `user_id IS ?` bound to a [`Tenant`], so a call
//! can never observe or touch another tenant's rows, including the anonymous
//! bucket versus a real user. Read-modify-write operations ([`update_note`],
//! [`append_note`], [`toggle_favorite`]) run inside `BEGIN IMMEDIATE`
//! transactions, which take SQLite's write lock before the read and so cannot
//! lose a concurrent update.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::types::{ImportedNote, Note, NoteId, NoteUpdate, Tenant};
use crate::error::StoreError;

const NOTE_COLUMNS: &str = "id, title, content, created_at, updated_at, favorite, user_id";

/// Current time in the wire format used for note timestamps.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn row_to_note(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        favorite: row.get::<_, i64>(5)? != 0,
        tenant: Tenant::from(row.get::<_, Option<i64>>(6)?),
    })
}

/// Look up a note owned by `tenant`, or `None`.
pub fn find_note(conn: &Connection, tenant: Tenant, id: NoteId) -> Result<Option<Note>, StoreError> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1 AND user_id IS ?2"),
            params![id, tenant],
            row_to_note,
        )
        .optional()?;
    Ok(note)
}

/// Fetch a note owned by `tenant`.
pub fn get_note(conn: &Connection, tenant: Tenant, id: NoteId) -> Result<Note, StoreError> {
    find_note(conn, tenant, id)?.ok_or(StoreError::NotFound(id))
}

/// Insert a new note owned by `tenant`.
pub fn create_note(
    conn: &Connection,
    tenant: Tenant,
    title: &str,
    content: &str,
) -> Result<Note, StoreError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO notes (title, content, created_at, updated_at, user_id, favorite) \
         VALUES (?1, ?2, ?3, ?3, ?4, 0)",
        params![title, content, now, tenant],
    )?;
    get_note(conn, tenant, conn.last_insert_rowid())
}

/// Apply a partial update. Unset fields keep their values; `updated_at` is bumped.
pub fn update_note(
    conn: &mut Connection,
    tenant: Tenant,
    id: NoteId,
    update: &NoteUpdate,
) -> Result<Note, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing = get_note(&tx, tenant, id)?;

    let title = update.title.as_deref().unwrap_or(&existing.title);
    let content = update.content.as_deref().unwrap_or(&existing.content);
    let favorite = update.favorite.unwrap_or(existing.favorite);

    tx.execute(
        "UPDATE notes SET title = ?1, content = ?2, favorite = ?3, updated_at = ?4 \
         WHERE id = ?5 AND user_id IS ?6",
        params![title, content, favorite as i64, now_timestamp(), id, tenant],
    )?;
    let note = get_note(&tx, tenant, id)?;
    tx.commit()?;
    Ok(note)
}

/// Append `text` to a note's body, separated by a blank line when the body is
/// non-empty. Empty `text` returns the note unchanged.
pub fn append_note(
    conn: &mut Connection,
    tenant: Tenant,
    id: NoteId,
    text: &str,
) -> Result<Note, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing = get_note(&tx, tenant, id)?;
    if text.is_empty() {
        return Ok(existing);
    }

    let separator = if existing.content.is_empty() { "" } else { "\n\n" };
    let content = format!("{}{separator}{text}", existing.content);

    tx.execute(
        "UPDATE notes SET content = ?1, updated_at = ?2 WHERE id = ?3 AND user_id IS ?4",
        params![content, now_timestamp(), id, tenant],
    )?;
    let note = get_note(&tx, tenant, id)?;
    tx.commit()?;
    Ok(note)
}

/// Flip the favorite flag. Does not bump `updated_at`.
pub fn toggle_favorite(conn: &mut Connection, tenant: Tenant, id: NoteId) -> Result<Note, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing = get_note(&tx, tenant, id)?;

    tx.execute(
        "UPDATE notes SET favorite = ?1 WHERE id = ?2 AND user_id IS ?3",
        params![(!existing.favorite) as i64, id, tenant],
    )?;
    let note = get_note(&tx, tenant, id)?;
    tx.commit()?;
    Ok(note)
}

/// Delete a note, returning it as it was.
pub fn delete_note(conn: &mut Connection, tenant: Tenant, id: NoteId) -> Result<Note, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing = get_note(&tx, tenant, id)?;
    tx.execute(
        "DELETE FROM notes WHERE id = ?1 AND user_id IS ?2",
        params![id, tenant],
    )?;
    tx.commit()?;
    Ok(existing)
}

fn query_notes(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Note>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let notes = stmt
        .query_map(params, row_to_note)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

/// All notes for `tenant`, oldest first.
pub fn list_notes(conn: &Connection, tenant: Tenant) -> Result<Vec<Note>, StoreError> {
    query_notes(
        conn,
        &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE user_id IS ?1 ORDER BY id ASC"),
        params![tenant],
    )
}

/// Notes changed after `since` (an RFC 3339 timestamp), most recently updated first.
pub fn list_updated_since(
    conn: &Connection,
    tenant: Tenant,
    since: &str,
) -> Result<Vec<Note>, StoreError> {
    query_notes(
        conn,
        &format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id IS ?1 AND updated_at > ?2 \
             ORDER BY updated_at DESC, id DESC"
        ),
        params![tenant, since],
    )
}

/// Escape LIKE metacharacters so a keyword matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Newest-first notes for `tenant`, optionally filtered by keyword.
///
/// The keyword matches title or content case-insensitively, or a note whose id
/// is written exactly as the keyword. A blank keyword lists recent notes.
pub fn search_notes(
    conn: &Connection,
    tenant: Tenant,
    keyword: Option<&str>,
    limit: usize,
) -> Result<Vec<Note>, StoreError> {
    let limit = limit as i64;
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());

    let Some(keyword) = keyword else {
        return query_notes(
            conn,
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id IS ?1 \
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            ),
            params![tenant, limit],
        );
    };

    let pattern = like_pattern(keyword);

    // The id matches on its exact decimal text, so "007" is not note 7.
    query_notes(
        conn,
        &format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE user_id IS ?1 \
             AND (title LIKE ?2 ESCAPE '\\' \
                  OR content LIKE ?2 ESCAPE '\\' \
                  OR CAST(id AS TEXT) = ?3) \
             ORDER BY created_at DESC, id DESC LIMIT ?4"
        ),
        params![tenant, pattern, keyword, limit],
    )
}

/// Insert a note from an export file, keeping its timestamps when present.
pub fn import_note(conn: &Connection, tenant: Tenant, note: &ImportedNote) -> Result<Note, StoreError> {
    let now = now_timestamp();
    let created = note.created_at.as_deref().unwrap_or(&now);
    let updated = note.updated_at.as_deref().unwrap_or(&now);

    conn.execute(
        "INSERT INTO notes (title, content, created_at, updated_at, user_id, favorite) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![note.title, note.content, created, updated, tenant, note.favorite as i64],
    )?;
    get_note(conn, tenant, conn.last_insert_rowid())
}

/// Remove every note owned by `tenant`. Returns the number removed.
pub fn delete_all_for_tenant(conn: &Connection, tenant: Tenant) -> Result<usize, StoreError> {
    Ok(conn.execute("DELETE FROM notes WHERE user_id IS ?1", params![tenant])?)
}

/// Administrative merge: move every note owned by `from` to `to`.
///
/// This is the only operation that changes a note's owner.
pub fn reassign_notes(conn: &mut Connection, from: Tenant, to: Tenant) -> Result<usize, StoreError> {
    if from == to {
        return Ok(0);
    }
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let moved = tx.execute(
        "UPDATE notes SET user_id = ?1 WHERE user_id IS ?2",
        params![to, from],
    )?;
    tx.commit()?;
    tracing::info!(%from, %to, moved, "notes reassigned");
    Ok(moved)
}

/// Number of notes owned by `tenant`.
pub fn count_notes(conn: &Connection, tenant: Tenant) -> Result<u64, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notes WHERE user_id IS ?1",
        params![tenant],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
