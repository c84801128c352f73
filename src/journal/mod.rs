//! The journal domain: directory and session over the backend program's
//! record store, kept consistent through the view cache.

pub mod directory;
pub mod resolver;
pub mod session;
pub mod types;
