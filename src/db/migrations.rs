//! Versioned, forward-only schema upgrades.
//!
//! `schema_meta.schema_version` records how far a database has been brought.
//! Each entry in [`MIGRATIONS`] moves it up by exactly one and commits
//! atomically with the version bump.

use rusqlite::{params, Connection};

/// A single upgrade step from `version - 1` to `version`.
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 2,
    name: "tenant listing indexes",
    sql: "CREATE INDEX IF NOT EXISTS idx_notes_user_created ON notes(user_id, created_at);
          CREATE INDEX IF NOT EXISTS idx_notes_user_updated ON notes(user_id, updated_at);",
}];

/// Version this build reads and writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Recorded schema version; `0` if the stored value is not a number.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: String = conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| row.get(0),
    )?;
    Ok(raw.trim().parse().unwrap_or(0))
}

/// Apply every migration newer than the recorded version, in order.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let from = get_schema_version(conn)?;
    if from >= CURRENT_SCHEMA_VERSION {
        tracing::debug!(schema_version = from, "schema up to date");
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
            params![migration.version.to_string()],
        )?;
        tx.commit()?;
        tracing::info!(version = migration.version, name = migration.name, "applied migration");
    }

    Ok(())
}
