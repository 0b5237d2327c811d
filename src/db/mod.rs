pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open a connection with the pragmas every connection needs.
fn configure_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;

    // WAL lets readers proceed while a writer holds the lock
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;

    Ok(conn)
}

/// Open (or create) the notes database at the given path with schema initialized
/// and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = configure_connection(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database for testing.
#[cfg(test)]
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Health report for `local-notes stats`.
#[derive(Debug)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub user_count: u64,
    pub note_count: u64,
    pub anonymous_note_count: u64,
}

/// Run `PRAGMA integrity_check` and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let schema_version = migrations::get_schema_version(conn)?;
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    let note_count: i64 = conn.query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
    let anonymous_note_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notes WHERE user_id IS NULL",
        [],
        |row| row.get(0),
    )?;

    Ok(HealthReport {
        integrity_ok: integrity == "ok",
        integrity_details: integrity,
        schema_version,
        user_count: user_count as u64,
        note_count: note_count as u64,
        anonymous_note_count: anonymous_note_count as u64,
    })
}

/// Hands r2d2 connections to one database file, each set up by
/// [`configure_connection`].
#[derive(Debug)]
struct SqliteManager {
    path: PathBuf,
}

impl r2d2::ManageConnection for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        configure_connection(&self.path)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch("")
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

/// Routes r2d2's connection errors into the tracing stream.
#[derive(Debug)]
struct TracingErrorHandler;

impl r2d2::HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        tracing::warn!(error = %error, "sqlite connection error");
    }
}

/// A bounded set of SQLite connections to one database file.
///
/// Each [`Pool::run`] call checks out a connection on a blocking thread, so
/// store calls from different tenants never wait on a process-wide lock; the
/// only serialization is SQLite's own write lock.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    path: PathBuf,
    size: usize,
    /// `None` once closed; dropping the last clone releases idle connections.
    pool: RwLock<Option<r2d2::Pool<SqliteManager>>>,
}

impl Pool {
    /// Open the database (creating schema and running migrations) and build a
    /// pool of at most `size` connections.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = size.max(1);
        drop(open_database(&path)?);

        let pool = r2d2::Pool::builder()
            .max_size(u32::try_from(size).unwrap_or(u32::MAX))
            .min_idle(Some(1))
            .connection_timeout(BUSY_TIMEOUT)
            .error_handler(Box::new(TracingErrorHandler))
            .build(SqliteManager { path: path.clone() })
            .with_context(|| format!("failed to build connection pool for {}", path.display()))?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                path,
                size,
                pool: RwLock::new(Some(pool)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Run `f` against a pooled connection on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self
            .inner
            .pool
            .read()
            .map_err(|e| StoreError::Unavailable(format!("pool lock poisoned: {e}")))?
            .clone()
            .ok_or_else(|| StoreError::Unavailable("connection pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Unavailable(e.to_string()))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }

    /// Stop handing out connections. In-flight calls finish normally.
    pub fn close(&self) {
        if let Ok(mut pool) = self.inner.pool.write() {
            pool.take();
        }
    }
}
