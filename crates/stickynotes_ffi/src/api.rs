//! FFI use-case API for the rendering layer.
//!
//! # Responsibility
//! - Expose one function per UI gesture via FRB.
//! - Own the process-wide note session behind the FFI boundary.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures come back as envelopes with `ok = false` and a stable
//!   `error_code`, never as silently rendered state.

use log::warn;
use stickynotes_core::{
    init_logging as init_logging_inner, Note, NoteSession, NoteStore, SessionError,
};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

const DATA_DIR_ENV: &str = "STICKYNOTES_DATA_DIR";
const DEFAULT_DATA_DIR_NAME: &str = "stickynotes";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static SESSION: OnceLock<Mutex<NoteSession<NoteStore>>> = OnceLock::new();

/// Initializes core logging once per process.
///
/// # FFI contract
/// - Sync call; may perform small file-system setup work.
/// - Idempotent for the same `level + log_dir`.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the directory holding the notes database.
///
/// Must run before the first note call; afterwards only the same directory
/// is accepted.
///
/// # FFI contract
/// - Sync call, no DB access.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_store_dir(dir: String) -> String {
    let trimmed = dir.trim();
    if trimmed.is_empty() {
        return "store dir cannot be empty".to_string();
    }

    let requested = PathBuf::from(trimmed);
    let active = DATA_DIR.get_or_init(|| requested.clone());
    if *active == requested {
        String::new()
    } else {
        format!(
            "store dir already set to `{}`; refusing to switch to `{}`",
            active.display(),
            requested.display()
        )
    }
}

/// Note shape handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub id: i64,
    /// Header color token.
    pub color: String,
    pub content: String,
    pub x: i64,
    pub y: i64,
    pub z_index: i64,
}

impl From<Note> for NoteItem {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            color: note.color,
            content: note.content,
            x: note.x,
            y: note.y,
            z_index: note.z_index,
        }
    }
}

/// Startup load response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesLoadResponse {
    pub ok: bool,
    /// Notes to render, ascending by id.
    pub items: Vec<NoteItem>,
    /// Stable error kind when `ok = false`.
    pub error_code: Option<String>,
    pub message: String,
}

/// Response envelope for single-note gestures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteActionResponse {
    pub ok: bool,
    /// Created note, for `note_create`.
    pub note: Option<NoteItem>,
    /// New stacking order, for `note_bring_to_front`.
    pub z_index: Option<i64>,
    /// Stable error kind when `ok = false`.
    pub error_code: Option<String>,
    pub message: String,
}

impl NoteActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            note: None,
            z_index: None,
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(action: &str, err: &SessionError) -> Self {
        Self {
            ok: false,
            note: None,
            z_index: None,
            error_code: Some(err.code().to_string()),
            message: format!("{action} failed: {err}"),
        }
    }
}

/// Opens the store, seeds counters and returns every note to render.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Safe to call again; counters never move backwards.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_load() -> NotesLoadResponse {
    match lock_session().initialize() {
        Ok(notes) => NotesLoadResponse {
            ok: true,
            message: format!("Loaded {} note(s).", notes.len()),
            items: notes.into_iter().map(NoteItem::from).collect(),
            error_code: None,
        },
        Err(err) => NotesLoadResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(err.code().to_string()),
            message: format!("notes_load failed: {err}"),
        },
    }
}

/// Creates an empty note at the origin, in front of every other note.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Requires a prior successful `notes_load`.
/// - Never panics; on failure nothing should be rendered.
#[flutter_rust_bridge::frb(sync)]
pub fn note_create(color: String) -> NoteActionResponse {
    match lock_session().create_note(color.as_str()) {
        Ok(note) => NoteActionResponse {
            note: Some(note.into()),
            ..NoteActionResponse::success("Note created.")
        },
        Err(err) => NoteActionResponse::failure("note_create", &err),
    }
}

/// Persists edited note text.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics; the caller keeps its optimistic text on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn note_update_content(id: i64, content: String) -> NoteActionResponse {
    match lock_session().update_content(id, content) {
        Ok(()) => NoteActionResponse::success("Note content saved."),
        Err(err) => NoteActionResponse::failure("note_update_content", &err),
    }
}

/// Raises a note above all others and returns its new zIndex.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn note_bring_to_front(id: i64) -> NoteActionResponse {
    match lock_session().bring_to_front(id) {
        Ok(z_index) => NoteActionResponse {
            z_index: Some(z_index),
            ..NoteActionResponse::success("Note brought to front.")
        },
        Err(err) => NoteActionResponse::failure("note_bring_to_front", &err),
    }
}

/// Persists the position a drag gesture ended at.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn note_reposition(id: i64, x: i64, y: i64) -> NoteActionResponse {
    match lock_session().reposition(id, x, y) {
        Ok(()) => NoteActionResponse::success("Note position saved."),
        Err(err) => NoteActionResponse::failure("note_reposition", &err),
    }
}

/// Deletes a note permanently. Deleting an absent note succeeds.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn note_delete(id: i64) -> NoteActionResponse {
    match lock_session().delete_note(id) {
        Ok(()) => NoteActionResponse::success("Note deleted."),
        Err(err) => NoteActionResponse::failure("note_delete", &err),
    }
}

fn resolve_data_dir() -> PathBuf {
    DATA_DIR
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DATA_DIR_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME)
        })
        .clone()
}

fn lock_session() -> MutexGuard<'static, NoteSession<NoteStore>> {
    SESSION
        .get_or_init(|| Mutex::new(NoteSession::new(NoteStore::in_dir(resolve_data_dir()))))
        .lock()
        .unwrap_or_else(|poisoned| {
            warn!("event=session_lock module=ffi status=recovered reason=poisoned");
            PoisonError::into_inner(poisoned)
        })
}

#[cfg(test)]
mod tests {
    use super::{
        configure_store_dir, init_logging, note_bring_to_front, note_create, note_delete,
        note_reposition, note_update_content, notes_load,
    };
    use std::sync::OnceLock;

    fn test_store() {
        static DIR: OnceLock<tempfile::TempDir> = OnceLock::new();
        let dir = DIR.get_or_init(|| tempfile::tempdir().expect("create temp dir"));
        let path = dir.path().to_str().expect("temp dir should be valid UTF-8");
        let error = configure_store_dir(path.to_string());
        assert!(error.is_empty(), "{error}");

        let loaded = notes_load();
        assert!(loaded.ok, "{}", loaded.message);
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn configure_store_dir_rejects_blank_and_switching() {
        test_store();
        assert!(!configure_store_dir("   ".to_string()).is_empty());
        let error = configure_store_dir("/definitely/another/dir".to_string());
        assert!(error.contains("refusing to switch"));
    }

    #[test]
    fn create_front_and_move_round_trip() {
        test_store();
        let created = note_create("red".to_string());
        assert!(created.ok, "{}", created.message);
        let note = created.note.expect("created note should be returned");
        assert_eq!((note.x, note.y), (0, 0));
        assert_eq!(note.content, "");

        let front = note_bring_to_front(note.id);
        assert!(front.ok, "{}", front.message);
        assert!(front.z_index.expect("z_index should be returned") > note.z_index);

        assert!(note_reposition(note.id, 120, 80).ok);
        assert!(note_update_content(note.id, "hello".to_string()).ok);

        let reloaded = notes_load();
        let stored = reloaded
            .items
            .iter()
            .find(|item| item.id == note.id)
            .expect("note should be reloaded");
        assert_eq!((stored.x, stored.y), (120, 80));
        assert_eq!(stored.content, "hello");
        assert_eq!(Some(stored.z_index), front.z_index);
    }

    #[test]
    fn failures_carry_error_codes() {
        test_store();
        let invalid = note_create("not a color".to_string());
        assert!(!invalid.ok);
        assert_eq!(invalid.error_code.as_deref(), Some("invalid_color"));

        let missing = note_reposition(i64::MAX, 1, 1);
        assert!(!missing.ok);
        assert_eq!(missing.error_code.as_deref(), Some("not_found"));
    }

    #[test]
    fn delete_removes_note_from_load() {
        test_store();
        let created = note_create("#00ff00".to_string());
        let id = created.note.expect("created note").id;

        assert!(note_delete(id).ok);
        assert!(note_delete(id).ok);
        assert!(notes_load().items.iter().all(|item| item.id != id));
    }
}
