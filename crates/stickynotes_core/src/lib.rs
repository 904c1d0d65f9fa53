//! Core persistence and session logic for sticky notes.
//! This crate is the single source of truth for id and stacking-order
//! invariants; rendering layers only call into it.

pub mod db;
pub mod logging;
pub mod model;
pub mod session;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use model::note::{NewNote, Note, NoteId, NotePatch, NoteValidationError};
pub use session::note_session::{
    NoteSession, SessionError, SessionResult, INITIAL_NEXT_ID, INITIAL_NEXT_Z_INDEX,
};
pub use store::{NoteRepository, NoteStore, StoreError, StoreLocation, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
