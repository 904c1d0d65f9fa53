//! Note session coordinator.
//!
//! # Responsibility
//! - Seed `next_id` / `next_z_index` from persisted notes at startup.
//! - Allocate ids and stacking order for every create and bring-to-front.
//! - Persist each UI gesture through the store and surface failures.
//!
//! # Invariants
//! - `next_id` is greater than every persisted id after `initialize`.
//! - `next_z_index` is greater than every persisted or handed-out zIndex.
//! - Neither counter ever decreases, except the rollback of a failed create.
//! - A counter that cannot advance fails the gesture; it never wraps or
//!   hands out the same value twice.
//! - Note content is never written to logs.

use crate::model::note::{normalize_color, NewNote, Note, NoteId, NotePatch};
use crate::store::{NoteRepository, StoreError};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// `next_id` for an empty store.
pub const INITIAL_NEXT_ID: NoteId = 0;
/// `next_z_index` for an empty store.
pub const INITIAL_NEXT_Z_INDEX: i64 = 1;

pub type SessionResult<T> = Result<T, SessionError>;

/// Error for session-level note operations.
#[derive(Debug)]
pub enum SessionError {
    /// Gesture issued before `initialize` seeded the counters.
    NotInitialized,
    /// Color input is not a recognized color token.
    InvalidColor(String),
    /// The named counter (`id` or `z_index`) has no value left to hand out.
    CounterExhausted(&'static str),
    /// Store-layer failure.
    Store(StoreError),
}

impl SessionError {
    /// Stable snake_case kind used in logs and response envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::InvalidColor(_) => "invalid_color",
            Self::CounterExhausted(_) => "counter_exhausted",
            Self::Store(err) => err.code(),
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "note session is not initialized"),
            Self::InvalidColor(value) => write!(f, "invalid color token: `{value}`"),
            Self::CounterExhausted(counter) => write!(f, "`{counter}` counter is exhausted"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Coordinates UI gestures with a note store.
///
/// Owns or borrows the store (`NoteSession<NoteStore>` or
/// `NoteSession<&NoteStore>`). Call [`NoteSession::initialize`] once before
/// any other operation.
pub struct NoteSession<R: NoteRepository> {
    store: R,
    next_id: NoteId,
    next_z_index: i64,
    initialized: bool,
}

impl<R: NoteRepository> NoteSession<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            next_id: INITIAL_NEXT_ID,
            next_z_index: INITIAL_NEXT_Z_INDEX,
            initialized: false,
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Id the next created note will receive.
    pub fn next_id(&self) -> NoteId {
        self.next_id
    }

    /// zIndex the next create or bring-to-front will receive.
    pub fn next_z_index(&self) -> i64 {
        self.next_z_index
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Opens the store, loads every note and seeds both counters.
    ///
    /// Seeds use the maximum id and zIndex over all loaded notes, so gaps
    /// left by deletions and the store's iteration order do not matter.
    /// Re-running it never lowers a counter.
    pub fn initialize(&mut self) -> SessionResult<Vec<Note>> {
        let notes = match self.store.open().and_then(|()| self.store.read_all()) {
            Ok(notes) => notes,
            Err(err) => {
                error!(
                    "event=session_init module=session status=error error_code={} error={}",
                    err.code(),
                    err
                );
                return Err(err.into());
            }
        };

        match seed_counters(&notes) {
            Ok(Some((next_id, next_z_index))) => {
                self.next_id = self.next_id.max(next_id);
                self.next_z_index = self.next_z_index.max(next_z_index);
            }
            Ok(None) => {}
            Err(err) => {
                error!(
                    "event=session_init module=session status=error notes={} error_code={} error={}",
                    notes.len(),
                    err.code(),
                    err
                );
                return Err(err);
            }
        }
        self.initialized = true;

        info!(
            "event=session_init module=session status=ok notes={} next_id={} next_z_index={}",
            notes.len(),
            self.next_id,
            self.next_z_index
        );
        Ok(notes)
    }

    /// Creates an empty note at the origin with the next id and zIndex.
    ///
    /// If the write fails both counters are restored, so the note is treated
    /// as never created.
    pub fn create_note(&mut self, color: &str) -> SessionResult<Note> {
        self.ensure_initialized()?;
        let color =
            normalize_color(color).map_err(|_| SessionError::InvalidColor(color.to_string()))?;

        let id = self.next_id;
        let z_index = self.next_z_index;
        let following_id = advance(id, "id")?;
        let following_z_index = advance(z_index, "z_index")?;
        self.next_id = following_id;
        self.next_z_index = following_z_index;

        let record = NewNote::new(color, z_index).with_id(id);
        match self.store.open().and_then(|()| self.store.create(&record)) {
            Ok(stored_id) => {
                info!(
                    "event=note_create module=session status=ok note_id={stored_id} z_index={z_index}"
                );
                Ok(record.into_note(stored_id))
            }
            Err(err) => {
                self.next_id = id;
                self.next_z_index = z_index;
                error!(
                    "event=note_create module=session status=error note_id={id} error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Persists edited text.
    ///
    /// The UI already shows the new text; a failed write is logged and
    /// returned but nothing is reverted.
    pub fn update_content(&self, id: NoteId, content: impl Into<String>) -> SessionResult<()> {
        self.ensure_initialized()?;
        self.persist_patch("note_update_content", id, NotePatch::content(content))
    }

    /// Moves a note above every other note and returns its new zIndex.
    ///
    /// The zIndex is consumed even when the write fails.
    pub fn bring_to_front(&mut self, id: NoteId) -> SessionResult<i64> {
        self.ensure_initialized()?;
        let z_index = self.next_z_index;
        self.next_z_index = advance(z_index, "z_index")?;

        self.persist_patch("note_bring_to_front", id, NotePatch::z_index(z_index))?;
        Ok(z_index)
    }

    /// Persists the final position of a drag gesture.
    pub fn reposition(&self, id: NoteId, x: i64, y: i64) -> SessionResult<()> {
        self.ensure_initialized()?;
        self.persist_patch("note_reposition", id, NotePatch::position(x, y))
    }

    /// Deletes a note. Freed ids and zIndex values are not reused.
    pub fn delete_note(&self, id: NoteId) -> SessionResult<()> {
        self.ensure_initialized()?;
        match self.store.open().and_then(|()| self.store.delete(id)) {
            Ok(()) => {
                info!("event=note_delete module=session status=ok note_id={id}");
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=note_delete module=session status=error note_id={id} error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Reads one note back from the store.
    pub fn note(&self, id: NoteId) -> SessionResult<Note> {
        self.ensure_initialized()?;
        let note = self.store.open().and_then(|()| self.store.read(id))?;
        Ok(note)
    }

    fn ensure_initialized(&self) -> SessionResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SessionError::NotInitialized)
        }
    }

    fn persist_patch(
        &self,
        event: &'static str,
        id: NoteId,
        patch: NotePatch,
    ) -> SessionResult<()> {
        match self.store.open().and_then(|()| self.store.update(id, &patch)) {
            Ok(()) => {
                debug!("event={event} module=session status=ok note_id={id}");
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event={event} module=session status=error note_id={id} error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

/// Returns `(max id + 1, max zIndex + 1)` over `notes`, or `None` when empty.
///
/// # Errors
/// - [`SessionError::CounterExhausted`] when a stored maximum is `i64::MAX`.
pub fn seed_counters(notes: &[Note]) -> SessionResult<Option<(NoteId, i64)>> {
    let (Some(max_id), Some(max_z_index)) = (
        notes.iter().map(|note| note.id).max(),
        notes.iter().map(|note| note.z_index).max(),
    ) else {
        return Ok(None);
    };
    Ok(Some((advance(max_id, "id")?, advance(max_z_index, "z_index")?)))
}

fn advance(value: i64, counter: &'static str) -> SessionResult<i64> {
    value
        .checked_add(1)
        .ok_or(SessionError::CounterExhausted(counter))
}

#[cfg(test)]
mod tests {
    use super::{seed_counters, NoteSession, SessionError, INITIAL_NEXT_ID, INITIAL_NEXT_Z_INDEX};
    use crate::model::note::{NewNote, Note, NoteId, NotePatch};
    use crate::store::{NoteRepository, StoreError, StoreResult};
    use std::cell::RefCell;

    fn note(id: NoteId, z_index: i64) -> Note {
        NewNote::new("red", z_index).into_note(id)
    }

    #[test]
    fn seed_counters_uses_maximum_not_last_element() {
        let notes = vec![note(7, 3), note(2, 9), note(5, 1)];
        assert_eq!(seed_counters(&notes).unwrap(), Some((8, 10)));
    }

    #[test]
    fn seed_counters_is_none_for_empty_store() {
        assert_eq!(seed_counters(&[]).unwrap(), None);
    }

    #[test]
    fn seed_counters_rejects_maximum_values_instead_of_saturating() {
        let err = seed_counters(&[note(1, i64::MAX)]).unwrap_err();
        assert!(matches!(err, SessionError::CounterExhausted("z_index")));

        let err = seed_counters(&[note(i64::MAX, 1)]).unwrap_err();
        assert_eq!(err.code(), "counter_exhausted");
    }

    /// Store double whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        notes: RefCell<Vec<Note>>,
        fail_writes: bool,
    }

    impl NoteRepository for FlakyStore {
        fn open(&self) -> StoreResult<()> {
            Ok(())
        }

        fn create(&self, record: &NewNote) -> StoreResult<NoteId> {
            if self.fail_writes {
                return Err(StoreError::Conflict("locked".to_string()));
            }
            let id = record.id.unwrap_or_default();
            self.notes.borrow_mut().push(record.clone().into_note(id));
            Ok(id)
        }

        fn read(&self, id: NoteId) -> StoreResult<Note> {
            self.notes
                .borrow()
                .iter()
                .find(|note| note.id == id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        }

        fn read_all(&self) -> StoreResult<Vec<Note>> {
            Ok(self.notes.borrow().clone())
        }

        fn update(&self, id: NoteId, patch: &NotePatch) -> StoreResult<()> {
            if self.fail_writes {
                return Err(StoreError::Conflict("locked".to_string()));
            }
            let mut notes = self.notes.borrow_mut();
            let note = notes
                .iter_mut()
                .find(|note| note.id == id)
                .ok_or(StoreError::NotFound(id))?;
            patch.apply_to(note);
            Ok(())
        }

        fn delete(&self, id: NoteId) -> StoreResult<()> {
            self.notes.borrow_mut().retain(|note| note.id != id);
            Ok(())
        }

        fn clear(&self) -> StoreResult<()> {
            self.notes.borrow_mut().clear();
            Ok(())
        }
    }

    #[test]
    fn gestures_before_initialize_are_rejected() {
        let mut session = NoteSession::new(FlakyStore::default());

        assert!(matches!(
            session.create_note("red"),
            Err(SessionError::NotInitialized)
        ));
        assert!(matches!(
            session.bring_to_front(0),
            Err(SessionError::NotInitialized)
        ));
        assert_eq!(session.next_id(), INITIAL_NEXT_ID);
        assert_eq!(session.next_z_index(), INITIAL_NEXT_Z_INDEX);
    }

    #[test]
    fn failed_create_rolls_counters_back() {
        let store = FlakyStore {
            fail_writes: true,
            ..FlakyStore::default()
        };
        let mut session = NoteSession::new(store);
        session.initialize().unwrap();

        let err = session.create_note("red").unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert_eq!(session.next_id(), INITIAL_NEXT_ID);
        assert_eq!(session.next_z_index(), INITIAL_NEXT_Z_INDEX);
        assert!(session.store().read_all().unwrap().is_empty());
    }

    #[test]
    fn failed_bring_to_front_still_consumes_z_index() {
        let mut session = NoteSession::new(FlakyStore::default());
        session.initialize().unwrap();
        let created = session.create_note("red").unwrap();

        session.store.fail_writes = true;
        assert!(session.bring_to_front(created.id).is_err());
        assert_eq!(session.next_z_index(), 3);

        session.store.fail_writes = false;
        assert_eq!(session.bring_to_front(created.id).unwrap(), 3);
    }

    #[test]
    fn invalid_color_does_not_allocate() {
        let mut session = NoteSession::new(FlakyStore::default());
        session.initialize().unwrap();

        let err = session.create_note("not a color").unwrap_err();
        assert!(matches!(err, SessionError::InvalidColor(_)));
        assert_eq!(err.code(), "invalid_color");
        assert_eq!(session.next_id(), INITIAL_NEXT_ID);
    }

    #[test]
    fn initialize_fails_when_stored_z_index_is_at_maximum() {
        let store = FlakyStore::default();
        store.notes.borrow_mut().push(note(0, i64::MAX));
        let mut session = NoteSession::new(store);

        let err = session.initialize().unwrap_err();
        assert_eq!(err.code(), "counter_exhausted");
        assert!(!session.is_initialized());
    }

    #[test]
    fn exhausted_z_index_fails_gestures_without_moving_counters() {
        let store = FlakyStore::default();
        store.notes.borrow_mut().push(note(4, i64::MAX - 1));
        let mut session = NoteSession::new(store);
        session.initialize().unwrap();
        assert_eq!(session.next_z_index(), i64::MAX);

        let err = session.bring_to_front(4).unwrap_err();
        assert!(matches!(err, SessionError::CounterExhausted("z_index")));
        assert_eq!(session.next_z_index(), i64::MAX);

        let err = session.create_note("red").unwrap_err();
        assert_eq!(err.code(), "counter_exhausted");
        assert_eq!(session.next_id(), 5);
        assert_eq!(session.store().read_all().unwrap().len(), 1);
        assert_eq!(session.note(4).unwrap().z_index, i64::MAX - 1);
    }

    #[test]
    fn failed_content_update_is_reported() {
        let mut session = NoteSession::new(FlakyStore::default());
        session.initialize().unwrap();
        let created = session.create_note("red").unwrap();

        session.store.fail_writes = true;
        let err = session.update_content(created.id, "draft").unwrap_err();
        assert_eq!(err.code(), "conflict");
        assert_eq!(session.note(created.id).unwrap().content, "");
    }
}
