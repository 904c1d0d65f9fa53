//! Store connection manager: lifecycle and CRUD over the notes collection.
//!
//! # Responsibility
//! - Own the single connection to the named, versioned sticky-notes database.
//! - Expose record-level CRUD contracts independent of SQL details.
//!
//! # Invariants
//! - The store moves `Closed -> Open` once and never back.
//! - Every CRUD call on a closed store fails with `StoreError::NotOpen` and
//!   leaves the database untouched.
//! - `update` is a single read-modify-write transaction.

use crate::db::DbError;
use crate::model::note::{NewNote, Note, NoteId, NotePatch, NoteValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note_store;

pub use note_store::{NoteStore, StoreLocation};

pub type StoreResult<T> = Result<T, StoreError>;

/// Error kinds surfaced by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Operation attempted before a successful `open()`.
    NotOpen,
    /// Engine refused to open, upgrade or validate the database.
    Connection(DbError),
    /// Read/update target is absent.
    NotFound(NoteId),
    /// Write transaction aborted.
    Write(DbError),
    /// Another process held the database lock past the busy timeout.
    Conflict(String),
    /// Record rejected before reaching storage.
    Validation(NoteValidationError),
    /// Unexpected read-side transport failure.
    Db(DbError),
}

impl StoreError {
    /// Stable snake_case kind used in logs and response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotOpen => "not_open",
            Self::Connection(_) => "connection",
            Self::NotFound(_) => "not_found",
            Self::Write(_) => "write",
            Self::Conflict(_) => "conflict",
            Self::Validation(_) => "validation",
            Self::Db(_) => "db",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOpen => write!(f, "note store is not open"),
            Self::Connection(err) => write!(f, "failed to open note store: {err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Write(err) => write!(f, "note write aborted: {err}"),
            Self::Conflict(message) => write!(f, "note store is locked: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Connection(err) | Self::Write(err) | Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::NotOpen | Self::NotFound(_) | Self::Conflict(_) => None,
        }
    }
}

impl From<NoteValidationError> for StoreError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Record-level contract implemented by note stores.
pub trait NoteRepository {
    /// Opens the backing database. Idempotent.
    fn open(&self) -> StoreResult<()>;
    /// Inserts one record and returns its key.
    fn create(&self, record: &NewNote) -> StoreResult<NoteId>;
    /// Fetches one record by key.
    fn read(&self, id: NoteId) -> StoreResult<Note>;
    /// Returns every record in ascending key order.
    fn read_all(&self) -> StoreResult<Vec<Note>>;
    /// Shallow-merges `patch` over the stored record atomically.
    fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<()>;
    /// Removes one record. Absent keys are not an error.
    fn delete(&self, id: NoteId) -> StoreResult<()>;
    /// Removes every record.
    fn clear(&self) -> StoreResult<()>;
}

impl<R: NoteRepository + ?Sized> NoteRepository for &R {
    fn open(&self) -> StoreResult<()> {
        (**self).open()
    }

    fn create(&self, record: &NewNote) -> StoreResult<NoteId> {
        (**self).create(record)
    }

    fn read(&self, id: NoteId) -> StoreResult<Note> {
        (**self).read(id)
    }

    fn read_all(&self) -> StoreResult<Vec<Note>> {
        (**self).read_all()
    }

    fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<()> {
        (**self).update(id, patch)
    }

    fn delete(&self, id: NoteId) -> StoreResult<()> {
        (**self).delete(id)
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }
}
