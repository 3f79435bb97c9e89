use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use folio_core::error::FolioError;
use folio_core::types::SessionId;
use folio_storage::{Session, SessionStore};

/// In-memory working set of sessions in front of the durable store.
///
/// Reads fall through to the store on a miss and populate memory. Writes go
/// to the store first and only replace the in-memory entry once the store
/// has accepted them. The cache is unbounded; entries leave only through
/// [`SessionCache::evict`].
pub struct SessionCache {
    sessions: RwLock<HashMap<SessionId, Session>>,
    store: Arc<SessionStore>,
}

impl SessionCache {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Get a session from memory, loading it from the store on a miss.
    ///
    /// A loaded copy never replaces an entry that appeared in the meantime.
    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, FolioError> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(Some(session.clone()));
        }

        let Some(session) = self.store.load(id)? else {
            return Ok(None);
        };
        debug!(session = %id.short(), "Session loaded into cache");
        // A put may have landed while the store was being read; it wins.
        let cached = self
            .sessions
            .write()
            .await
            .entry(id.clone())
            .or_insert(session)
            .clone();
        Ok(Some(cached))
    }

    /// Save a session to the store, then replace the in-memory entry.
    pub async fn put(&self, session: Session) -> Result<(), FolioError> {
        self.store.save(&session)?;
        self.sessions.write().await.insert(session.id.clone(), session);
        Ok(())
    }

    /// Drop a session from memory only.
    pub async fn evict(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
    }

    /// Whether a session is currently held in memory.
    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of sessions held in memory.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::types::Role;
    use folio_vector::embedding::MockEmbedding;

    fn cache(dir: &std::path::Path) -> SessionCache {
        let store = SessionStore::open(dir, Arc::new(MockEmbedding::new())).unwrap();
        SessionCache::new(Arc::new(store))
    }

    fn id(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_put_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());

        let mut session = Session::new(id("wt"));
        session.push_message(Role::User, "hello");
        cache.put(session).await.unwrap();

        assert!(cache.contains(&id("wt")).await);
        let stored = cache.store().load(&id("wt")).unwrap().unwrap();
        assert_eq!(stored.chat_history.len(), 1);
    }

    #[tokio::test]
    async fn test_get_reads_through_and_populates() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.store().save(&Session::new(id("cold"))).unwrap();

        assert!(!cache.contains(&id("cold")).await);
        let session = cache.get(&id("cold")).await.unwrap().unwrap();
        assert_eq!(session.id, id("cold"));
        assert!(cache.contains(&id("cold")).await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        assert!(cache.get(&id("nobody")).await.unwrap().is_none());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_wins_over_store() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(Session::new(id("hot"))).await.unwrap();

        // A store-only delete is invisible until the entry is evicted.
        cache.store().delete(&id("hot")).unwrap();
        assert!(cache.get(&id("hot")).await.unwrap().is_some());

        cache.evict(&id("hot")).await;
        assert!(cache.get(&id("hot")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evict_keeps_durable_copy() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path());
        cache.put(Session::new(id("evicted"))).await.unwrap();

        cache.evict(&id("evicted")).await;
        assert!(!cache.contains(&id("evicted")).await);
        assert!(cache.get(&id("evicted")).await.unwrap().is_some());
    }
}
