//! Session lifecycle: creation, document attachment, message append,
//! deletion and expiry.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use folio_core::error::FolioError;
use folio_core::types::{Role, SessionId};
use folio_storage::{Session, SessionStore};
use folio_vector::index::SemanticIndex;

use crate::cache::SessionCache;
use crate::locks::{SessionGuard, SessionLocks};

/// Orchestrates session mutations over the cache and the durable store.
///
/// Every public mutation takes the session's lock for its duration. Callers
/// that need several steps to be atomic (a chat turn) hold a
/// [`LockedSession`] from [`SessionManager::lock`] instead.
pub struct SessionManager {
    cache: SessionCache,
    locks: SessionLocks,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            cache: SessionCache::new(store),
            locks: SessionLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.cache.store()
    }

    /// Take exclusive access to one session.
    pub async fn lock(&self, id: &SessionId) -> LockedSession<'_> {
        let guard = self.locks.acquire(id).await;
        LockedSession {
            manager: self,
            id: id.clone(),
            _guard: guard,
        }
    }

    pub async fn get_or_create(&self, id: &SessionId) -> Result<Session, FolioError> {
        self.lock(id).await.get_or_create().await
    }

    pub async fn attach_document(
        &self,
        id: &SessionId,
        index: SemanticIndex,
        filename: &str,
    ) -> Result<Session, FolioError> {
        self.lock(id).await.attach_document(index, filename).await
    }

    pub async fn append_message(
        &self,
        id: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<Session, FolioError> {
        self.lock(id).await.append_message(role, content).await
    }

    /// Look a session up without creating it.
    ///
    /// Takes the session's lock so a read cannot race a delete or sweep and
    /// put the removed session back into memory.
    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, FolioError> {
        self.lock(id).await.get().await
    }

    /// Delete a session. Unknown ids are not an error.
    ///
    /// Durable state goes first so that a crash in between leaves at worst
    /// a stale cache entry.
    pub async fn delete(&self, id: &SessionId) -> Result<(), FolioError> {
        let _guard = self.locks.acquire(id).await;
        self.store().delete(id)?;
        self.cache.evict(id).await;
        info!(session = %id.short(), "Session deleted");
        Ok(())
    }

    /// Delete sessions idle for longer than `max_age` and evict them from
    /// memory. Returns the swept ids.
    ///
    /// Each candidate is re-checked under its lock, so a session that saw
    /// activity after enumeration survives.
    pub async fn sweep_expired(&self, max_age: Duration) -> Result<Vec<SessionId>, FolioError> {
        let candidates = self.store().expired(max_age)?;
        let mut swept = Vec::with_capacity(candidates.len());

        for id in candidates {
            let _guard: SessionGuard = self.locks.acquire(&id).await;
            match self.store().delete_if_expired(&id, max_age) {
                Ok(true) => {
                    self.cache.evict(&id).await;
                    swept.push(id);
                }
                Ok(false) => {}
                Err(e) => warn!(session = %id.short(), error = %e, "Failed to sweep session"),
            }
        }

        self.locks.prune();
        info!(count = swept.len(), max_age_days = max_age.num_days(), "Expiry sweep finished");
        Ok(swept)
    }

    /// Number of sessions currently held in memory.
    pub async fn active_sessions(&self) -> usize {
        self.cache.len().await
    }
}

/// A session held under its lock.
///
/// Dropping the value releases the lock.
pub struct LockedSession<'a> {
    manager: &'a SessionManager,
    id: SessionId,
    _guard: SessionGuard,
}

impl LockedSession<'_> {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session if it exists.
    pub async fn get(&self) -> Result<Option<Session>, FolioError> {
        self.manager.cache.get(&self.id).await
    }

    /// The session, created empty under the "General Chat" label if absent.
    pub async fn get_or_create(&self) -> Result<Session, FolioError> {
        if let Some(session) = self.manager.cache.get(&self.id).await? {
            return Ok(session);
        }
        let session = Session::new(self.id.clone());
        self.manager.cache.put(session.clone()).await?;
        info!(session = %self.id.short(), "Session created");
        Ok(session)
    }

    /// Attach a document's index, merging with any index already present.
    ///
    /// If the existing index was built by a different embedder it is
    /// replaced by the new one and a warning is logged.
    pub async fn attach_document(
        &self,
        index: SemanticIndex,
        filename: &str,
    ) -> Result<Session, FolioError> {
        let mut session = self.get_or_create().await?;

        let combined = match session.index.take() {
            None => index,
            Some(existing) => match existing.merge(&index) {
                Ok(merged) => merged,
                Err(FolioError::IncompatibleEmbedding { left, right }) => {
                    warn!(
                        session = %self.id.short(),
                        existing = %left,
                        incoming = %right,
                        "Incompatible embeddings; replacing the existing index"
                    );
                    index
                }
                Err(e) => return Err(e),
            },
        };

        let fragments = combined.len();
        session.index = Some(combined);
        session.add_document_name(filename);
        session.touch();
        self.manager.cache.put(session.clone()).await?;

        info!(
            session = %self.id.short(),
            filename,
            fragments,
            "Document attached"
        );
        Ok(session)
    }

    /// Append a message, creating the session if needed.
    pub async fn append_message(&self, role: Role, content: &str) -> Result<Session, FolioError> {
        let mut session = self.get_or_create().await?;
        session.push_message(role, content);
        self.manager.cache.put(session.clone()).await?;
        Ok(session)
    }
}
