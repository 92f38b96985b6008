//! Append-only history of finished uploads.
//!
//! Records are only ever appended; nothing is updated or deleted. The JSON file
//! store replaces the whole file through a temp file and an atomic rename, so a
//! reader always sees either the old or the new list.

pub mod error;
pub mod store;

pub use error::{HistoryError, HistoryResult};
pub use store::{HistoryStore, JsonHistoryStore, MemoryHistoryStore};
