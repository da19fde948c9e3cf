//! Shared ids, error types and the CRDT document boundary for the
//! synchronizer runtime.

pub mod document;
pub mod error;
pub mod ids;
pub mod prelude;
pub mod timestamp;

// vim: ts=4
