//! Folio Storage crate - durable session records and index artifacts.
//!
//! Provides a WAL-mode SQLite database with migrations, the typed
//! `Session` record, and the `SessionStore` that persists records and
//! semantic index artifacts and sweeps expired sessions.

pub mod db;
pub mod migrations;
pub mod session;
pub mod store;

pub use db::Database;
pub use session::{Session, SessionRecord};
pub use store::SessionStore;
