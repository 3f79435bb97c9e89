//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Configures WAL mode and recommended PRAGMAs on initialization.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use folio_core::error::FolioError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
///
/// Uses WAL mode so a freshly started process can read while another
/// connection writes. The connection is wrapped in a Mutex since rusqlite
/// Connection is not Sync.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path and run pending
    /// migrations.
    pub fn new(path: &Path) -> Result<Self, FolioError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| FolioError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| FolioError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, FolioError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FolioError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, FolioError>
    where
        F: FnOnce(&Connection) -> Result<T, FolioError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FolioError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_count(db: &Database) -> i64 {
        db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(|e| FolioError::Storage(e.to_string()))
        })
        .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(session_count(&db), 0);
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("folio.db");
        let db = Database::new(&path).unwrap();
        assert_eq!(session_count(&db), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");
        drop(Database::new(&path).unwrap());
        let db = Database::new(&path).unwrap();
        assert_eq!(session_count(&db), 0);
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("folio.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
                    .map_err(|e| FolioError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
