//! Note session coordination.
//!
//! # Responsibility
//! - Translate UI gestures into store operations.
//! - Keep id and stacking-order allocation consistent with persisted state.
//!
//! # See also
//! - `store` for the record-level contract.

pub mod note_session;
