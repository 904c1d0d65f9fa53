//! SQLite storage bootstrap and schema entry points.
//!
//! # Responsibility
//! - Open and configure the single named sticky-notes database.
//! - Create the `notes` collection only when the stored schema version is
//!   behind the version known by this binary.
//! - Verify that an opened database exposes the collection core expects.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write notes before `ensure_schema` and
//!   `verify_schema` succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;

pub use open::{
    connect, connect_in_memory, ensure_schema, schema_version, verify_schema, BUSY_TIMEOUT,
    SCHEMA_VERSION,
};

/// Fixed logical name of the local database.
pub const DATABASE_NAME: &str = "stickynotes";

/// File name used when the database lives inside a data directory.
pub const DATABASE_FILE_NAME: &str = "stickynotes.sqlite3";

/// Name of the single record collection.
pub const NOTES_TABLE: &str = "notes";

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl DbError {
    /// Returns whether the engine reported the database as locked by another
    /// connection after the busy timeout elapsed.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
