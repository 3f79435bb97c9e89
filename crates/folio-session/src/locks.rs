//! Per-session mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use folio_core::types::SessionId;

/// Guard held while a session is being mutated.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Table of one async mutex per session id.
///
/// Requests for the same session queue behind each other; different
/// sessions never contend beyond the brief table lookup.
#[derive(Default)]
pub struct SessionLocks {
    table: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn acquire(&self, id: &SessionId) -> SessionGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(table.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop table entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let before = table.len();
        table.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - table.len()
    }

    /// Number of ids with a lock entry.
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
