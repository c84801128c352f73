//! Explicit key-value cache for derived views of ledger state.
//!
//! This module provides the read-side consistency mechanism:
//! - Structured view keys embedding the scope and network they derive from
//! - A storage trait with in-memory and SQLite backends
//! - A cache layer with read-through fetching, forced refresh, and
//!   pattern-based invalidation

mod keys;
mod layer;
mod storage;

pub use keys::{KeyPattern, ViewKey};
pub use layer::ViewCache;
pub use storage::{MemoryStore, SqliteStore, StoredView, ViewStore};
