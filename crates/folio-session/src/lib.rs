//! Folio Session crate - session cache, per-session locking, and lifecycle.
//!
//! `SessionCache` is the in-memory working set in front of the durable
//! `SessionStore`; `SessionManager` serializes mutations per session id and
//! implements creation, document attachment, message append, deletion and
//! the expiry sweep.

pub mod cache;
pub mod locks;
pub mod manager;

pub use cache::SessionCache;
pub use locks::{SessionGuard, SessionLocks};
pub use manager::{LockedSession, SessionManager};
