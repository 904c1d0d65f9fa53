//! Two-phase open for the sticky-notes database.
//!
//! # Responsibility
//! - `connect`: open a file or in-memory SQLite connection and configure it.
//! - `ensure_schema`: create the notes collection on first open or upgrade.
//! - `verify_schema`: reject databases missing the expected collection shape.
//!
//! # Invariants
//! - Returned connections have a busy timeout of [`BUSY_TIMEOUT`].
//! - Schema version is mirrored to `PRAGMA user_version`.
//! - `ensure_schema` is a no-op when the stored version is current.

use super::{DbError, DbResult, NOTES_TABLE};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a statement waits on a lock held by another connection.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

const NOTES_SCHEMA_SQL: &str = include_str!("notes_schema.sql");

const NOTES_COLUMNS: [&str; 6] = ["id", "color", "content", "x", "y", "z_index"];

/// Opens (creating if needed) a SQLite database file.
///
/// Does not touch the schema; pair with [`ensure_schema`].
///
/// # Side effects
/// - Emits `db_connect` logging events with duration and status.
pub fn connect(path: impl AsRef<Path>) -> DbResult<Connection> {
    connect_with("file", || Connection::open(path))
}

/// Opens a private in-memory SQLite database.
pub fn connect_in_memory() -> DbResult<Connection> {
    connect_with("memory", Connection::open_in_memory)
}

/// Returns the version stored in the database header; `0` for a new file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Creates the notes collection when the stored version is behind
/// [`SCHEMA_VERSION`].
///
/// Returns `true` when the collection was created, `false` on a plain open.
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the file was written by a
///   newer binary.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<bool> {
    let stored = schema_version(conn)?;
    if stored > SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: SCHEMA_VERSION,
        });
    }
    if stored == SCHEMA_VERSION {
        return Ok(false);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(NOTES_SCHEMA_SQL)?;
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;

    info!(
        "event=schema_upgrade module=db status=ok from_version={stored} to_version={SCHEMA_VERSION}"
    );
    Ok(true)
}

/// Checks that the notes collection and all of its columns exist.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    if !table_exists(conn, NOTES_TABLE)? {
        return Err(DbError::MissingRequiredTable(NOTES_TABLE));
    }

    for column in NOTES_COLUMNS {
        if !table_has_column(conn, NOTES_TABLE, column)? {
            return Err(DbError::MissingRequiredColumn {
                table: NOTES_TABLE,
                column,
            });
        }
    }

    Ok(())
}

fn connect_with(
    mode: &'static str,
    opener: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_connect module=db status=start mode={mode}");

    let conn = opener().and_then(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    });

    match conn {
        Ok(conn) => {
            info!(
                "event=db_connect module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_connect module=db status=error mode={mode} duration_ms={} error_code=db_connect_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err.into())
        }
    }
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
