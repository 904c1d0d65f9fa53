//! Domain model for persisted sticky notes.
//!
//! # Responsibility
//! - Define the single record shape shared by storage and UI callers.
//! - Define partial-merge patches used by every in-place mutation.
//!
//! # Invariants
//! - Every note is identified by a unique, never-reused `NoteId`.
//! - Deletion is permanent; there is no tombstone state.

pub mod note;
