//! SQLite-backed note store.
//!
//! # Responsibility
//! - Lazily open the database and bootstrap the notes collection.
//! - Run each CRUD operation inside its own transaction.
//!
//! # Invariants
//! - The connection is created at most once per `NoteStore` value.
//! - Write paths validate records before SQL mutations.
//! - Read paths return stored rows as-is; a color written by another build
//!   must not hide the rest of the board.

use crate::db::{self, DbError, DATABASE_FILE_NAME, DATABASE_NAME};
use crate::model::note::{NewNote, Note, NoteId, NotePatch};
use crate::store::{NoteRepository, StoreError, StoreResult};
use log::{debug, error, info};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    color,
    content,
    x,
    y,
    z_index
FROM notes";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Data directory; the database file is [`DATABASE_FILE_NAME`] inside it.
    Directory(PathBuf),
    /// Explicit database file path.
    File(PathBuf),
    /// Private in-memory database, discarded with the store.
    Memory,
}

impl StoreLocation {
    /// Resolves the database file path, if any.
    pub fn db_path(&self) -> Option<PathBuf> {
        match self {
            Self::Directory(dir) => Some(dir.join(DATABASE_FILE_NAME)),
            Self::File(path) => Some(path.clone()),
            Self::Memory => None,
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }
}

/// Single authoritative handle to the sticky-notes database.
///
/// Constructed closed; call [`NoteRepository::open`] before any CRUD call.
/// Shareable by reference: the connection is guarded by a mutex, so
/// operations from several threads serialize on it.
pub struct NoteStore {
    location: StoreLocation,
    conn: Mutex<Option<Connection>>,
}

impl NoteStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            conn: Mutex::new(None),
        }
    }

    /// Store backed by `<dir>/stickynotes.sqlite3`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(StoreLocation::Directory(dir.into()))
    }

    /// Store backed by an explicit database file.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreLocation::File(path.into()))
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic mid-operation drops its transaction, which rolls back.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(StoreError::NotOpen)?;
        f(conn)
    }

    fn bootstrap(&self) -> Result<(Connection, bool), DbError> {
        let mut conn = match &self.location {
            StoreLocation::Directory(dir) => {
                std::fs::create_dir_all(dir)?;
                db::connect(dir.join(DATABASE_FILE_NAME))?
            }
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                db::connect(path)?
            }
            StoreLocation::Memory => db::connect_in_memory()?,
        };
        let upgraded = db::ensure_schema(&mut conn)?;
        db::verify_schema(&conn)?;
        Ok((conn, upgraded))
    }
}

impl NoteRepository for NoteStore {
    fn open(&self) -> StoreResult<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }

        let started_at = Instant::now();
        let mode = self.location.mode();
        match self.bootstrap() {
            Ok((conn, upgraded)) => {
                info!(
                    "event=store_open module=store status=ok database={DATABASE_NAME} mode={mode} schema_upgraded={upgraded} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                *guard = Some(conn);
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_open module=store status=error database={DATABASE_NAME} mode={mode} duration_ms={} error_code=store_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(StoreError::Connection(err))
            }
        }
    }

    fn create(&self, record: &NewNote) -> StoreResult<NoteId> {
        self.with_conn(|conn| {
            record.validate()?;

            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(write_error)?;
            tx.execute(
                "INSERT INTO notes (
                    id,
                    color,
                    content,
                    x,
                    y,
                    z_index
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    record.id,
                    record.color.as_str(),
                    record.content.as_str(),
                    record.x,
                    record.y,
                    record.z_index,
                ],
            )
            .map_err(write_error)?;
            let id = tx.last_insert_rowid();
            tx.commit().map_err(write_error)?;

            debug!("event=note_create module=store status=ok note_id={id}");
            Ok(id)
        })
    }

    fn read(&self, id: NoteId) -> StoreResult<Note> {
        self.with_conn(|conn| select_note(conn, id)?.ok_or(StoreError::NotFound(id)))
    }

    fn read_all(&self) -> StoreResult<Vec<Note>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY id ASC;"))
                .map_err(read_error)?;
            let mut rows = stmt.query([]).map_err(read_error)?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next().map_err(read_error)? {
                notes.push(parse_note_row(row)?);
            }

            debug!(
                "event=note_read_all module=store status=ok count={}",
                notes.len()
            );
            Ok(notes)
        })
    }

    fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<()> {
        self.with_conn(|conn| {
            patch.validate()?;

            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(write_error)?;
            let mut note = select_note(&tx, id)?.ok_or(StoreError::NotFound(id))?;
            patch.apply_to(&mut note);

            tx.execute(
                "UPDATE notes
                 SET
                    color = ?2,
                    content = ?3,
                    x = ?4,
                    y = ?5,
                    z_index = ?6
                 WHERE id = ?1;",
                params![
                    note.id,
                    note.color.as_str(),
                    note.content.as_str(),
                    note.x,
                    note.y,
                    note.z_index,
                ],
            )
            .map_err(write_error)?;
            tx.commit().map_err(write_error)?;

            debug!("event=note_update module=store status=ok note_id={id}");
            Ok(())
        })
    }

    fn delete(&self, id: NoteId) -> StoreResult<()> {
        self.with_conn(|conn| {
            let changed = conn
                .execute("DELETE FROM notes WHERE id = ?1;", [id])
                .map_err(write_error)?;
            if changed == 0 {
                debug!("event=note_delete module=store status=ok note_id={id} absent=true");
            } else {
                debug!("event=note_delete module=store status=ok note_id={id}");
            }
            Ok(())
        })
    }

    fn clear(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM notes;", [])
                .map_err(write_error)?;
            info!("event=store_clear module=store status=ok removed={removed}");
            Ok(())
        })
    }
}

fn select_note(conn: &Connection, id: NoteId) -> StoreResult<Option<Note>> {
    let mut stmt = conn
        .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))
        .map_err(read_error)?;
    let mut rows = stmt.query([id]).map_err(read_error)?;
    match rows.next().map_err(read_error)? {
        Some(row) => Ok(Some(parse_note_row(row)?)),
        None => Ok(None),
    }
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<Note> {
    Ok(Note {
        id: row.get("id").map_err(read_error)?,
        color: row.get("color").map_err(read_error)?,
        content: row.get("content").map_err(read_error)?,
        x: row.get("x").map_err(read_error)?,
        y: row.get("y").map_err(read_error)?,
        z_index: row.get("z_index").map_err(read_error)?,
    })
}

fn write_error(err: rusqlite::Error) -> StoreError {
    let err = DbError::from(err);
    if err.is_busy() {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Write(err)
    }
}

fn read_error(err: rusqlite::Error) -> StoreError {
    let err = DbError::from(err);
    if err.is_busy() {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Db(err)
    }
}

