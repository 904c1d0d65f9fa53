//! FFI surface for the sticky-notes rendering layer.

pub mod api;
