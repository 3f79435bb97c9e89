//! Durable session store.
//!
//! Structured records live in the `sessions` table; each session's semantic
//! index is written to `<vectors_dir>/<session_id>.json`. The artifact is
//! always written (temp file + rename) before the record that claims it,
//! so a record with `has_index = true` never precedes its artifact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use folio_core::error::FolioError;
use folio_core::types::SessionId;
use folio_vector::embedding::SharedEmbedder;
use folio_vector::index::SemanticIndex;

use crate::db::Database;
use crate::session::{Session, SessionRecord};

/// File name of the SQLite database inside the data directory.
pub const DATABASE_FILE: &str = "folio.db";

/// Subdirectory of the data directory holding index artifacts.
pub const VECTORS_DIR: &str = "vectors";

fn sql_err(context: &str) -> impl Fn(rusqlite::Error) -> FolioError + '_ {
    move |e| FolioError::Storage(format!("{}: {}", context, e))
}

/// Persists session records and index artifacts.
pub struct SessionStore {
    db: Database,
    vectors_dir: PathBuf,
    embedder: SharedEmbedder,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("vectors_dir", &self.vectors_dir)
            .finish()
    }
}

impl SessionStore {
    /// Open the store rooted at `data_dir`, creating it if needed.
    pub fn open(data_dir: &Path, embedder: SharedEmbedder) -> Result<Self, FolioError> {
        let db = Database::new(&data_dir.join(DATABASE_FILE))?;
        Self::with_database(db, data_dir.join(VECTORS_DIR), embedder)
    }

    /// Build a store from an existing database and artifact directory.
    pub fn with_database(
        db: Database,
        vectors_dir: PathBuf,
        embedder: SharedEmbedder,
    ) -> Result<Self, FolioError> {
        fs::create_dir_all(&vectors_dir)?;
        Ok(Self {
            db,
            vectors_dir,
            embedder,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    /// Path of the index artifact for `id`.
    pub fn artifact_path(&self, id: &SessionId) -> PathBuf {
        self.vectors_dir.join(format!("{}.json", id.as_str()))
    }

    // -----------------------------------------------------------------------
    // save / load
    // -----------------------------------------------------------------------

    /// Persist a session.
    ///
    /// A failure to write the index artifact is logged and the record is
    /// saved with `has_index = false`; the in-memory session keeps its index.
    /// A failure to write the record is returned.
    pub fn save(&self, session: &Session) -> Result<(), FolioError> {
        let mut record = session.to_record();

        match &session.index {
            Some(index) => {
                if let Err(e) = self.write_artifact(&session.id, index) {
                    warn!(
                        session = %session.id.short(),
                        error = %e,
                        "Failed to persist index artifact; saving record without index"
                    );
                    record.has_index = false;
                }
            }
            None => {
                if let Err(e) = self.remove_artifact(&session.id) {
                    warn!(session = %session.id.short(), error = %e, "Failed to remove stale index artifact");
                }
            }
        }

        let json = serde_json::to_string(&record)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, record, last_activity, updated_at)
                 VALUES (?1, ?2, ?3, strftime('%s', 'now'))
                 ON CONFLICT(session_id) DO UPDATE SET
                    record = excluded.record,
                    last_activity = excluded.last_activity,
                    updated_at = excluded.updated_at",
                params![
                    session.id.as_str(),
                    json,
                    record.last_activity.timestamp()
                ],
            )
            .map_err(sql_err("Failed to save session"))?;
            Ok(())
        })?;

        debug!(
            session = %session.id.short(),
            messages = record.chat_history.len(),
            has_index = record.has_index,
            "Session saved"
        );
        Ok(())
    }

    /// Load a session, reattaching its index when one was saved.
    ///
    /// Returns `None` for unknown ids and for records that cannot be
    /// decoded. A missing or unreadable artifact degrades to a session
    /// without an index.
    pub fn load(&self, id: &SessionId) -> Result<Option<Session>, FolioError> {
        let Some(raw) = self.read_record(id)? else {
            return Ok(None);
        };

        let record: SessionRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(session = %id.short(), error = %e, "Session record is corrupt");
                return Ok(None);
            }
        };

        let index = if record.has_index {
            match self.read_artifact(id) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!(
                        session = %id.short(),
                        error = %e,
                        "Record claims an index but the artifact could not be loaded; continuing without it"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(Session::from_record(record, index)))
    }

    /// Whether a record exists for `id`.
    pub fn exists(&self, id: &SessionId) -> Result<bool, FolioError> {
        Ok(self.read_record(id)?.is_some())
    }

    /// Remove a session's record and artifact. Unknown ids are not an error.
    pub fn delete(&self, id: &SessionId) -> Result<(), FolioError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM sessions WHERE session_id = ?1",
                params![id.as_str()],
            )
            .map_err(sql_err("Failed to delete session"))?;
            Ok(())
        })?;
        self.remove_artifact(id)?;
        debug!(session = %id.short(), "Session deleted from store");
        Ok(())
    }

    /// Number of stored session records.
    pub fn count(&self) -> Result<usize, FolioError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
                .map_err(sql_err("Failed to count sessions"))?;
            Ok(n as usize)
        })
    }

    // -----------------------------------------------------------------------
    // sweep
    // -----------------------------------------------------------------------

    /// Ids of sessions idle for longer than `max_age`.
    ///
    /// Records that fail to decode are logged and skipped.
    pub fn expired(&self, max_age: Duration) -> Result<Vec<SessionId>, FolioError> {
        let rows: Vec<(String, String)> = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT session_id, record FROM sessions ORDER BY last_activity ASC")
                .map_err(sql_err("Failed to prepare sweep query"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(sql_err("Failed to enumerate sessions"))?;
            let mut out: Vec<(String, String)> = Vec::new();
            for row in rows {
                match row {
                    Ok(pair) => out.push(pair),
                    Err(e) => warn!(error = %e, "Skipping unreadable session row"),
                }
            }
            Ok(out)
        })?;

        let now = Utc::now();
        let mut expired = Vec::new();
        for (key, raw) in rows {
            let record: SessionRecord = match serde_json::from_str(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(session = %key, error = %e, "Skipping corrupt session record during sweep");
                    continue;
                }
            };
            if now.signed_duration_since(record.last_activity) > max_age {
                match SessionId::parse(&key) {
                    Ok(id) => expired.push(id),
                    Err(e) => warn!(session = %key, error = %e, "Skipping session with invalid id"),
                }
            }
        }
        Ok(expired)
    }

    /// Delete `id` if it is still idle for longer than `max_age`.
    ///
    /// Returns whether the session was deleted.
    pub fn delete_if_expired(&self, id: &SessionId, max_age: Duration) -> Result<bool, FolioError> {
        let Some(raw) = self.read_record(id)? else {
            return Ok(false);
        };
        let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) else {
            return Ok(false);
        };
        if Utc::now().signed_duration_since(record.last_activity) <= max_age {
            return Ok(false);
        }
        self.delete(id)?;
        Ok(true)
    }

    /// Delete every session idle for longer than `max_age`.
    ///
    /// A failure to delete one session is logged and does not stop the
    /// sweep. Returns the ids actually deleted.
    pub fn sweep(&self, max_age: Duration) -> Result<Vec<SessionId>, FolioError> {
        let mut swept = Vec::new();
        for id in self.expired(max_age)? {
            match self.delete(&id) {
                Ok(()) => swept.push(id),
                Err(e) => warn!(session = %id.short(), error = %e, "Failed to delete expired session"),
            }
        }
        if !swept.is_empty() {
            info!(count = swept.len(), "Swept expired sessions");
        }
        Ok(swept)
    }

    // -----------------------------------------------------------------------
    // internals
    // -----------------------------------------------------------------------

    fn read_record(&self, id: &SessionId) -> Result<Option<String>, FolioError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT record FROM sessions WHERE session_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err("Failed to read session"))
        })
    }

    fn write_artifact(&self, id: &SessionId, index: &SemanticIndex) -> Result<(), FolioError> {
        let bytes = index.serialize()?;
        let path = self.artifact_path(id);
        let tmp_path = self.vectors_dir.join(format!(".{}.json.tmp", id.as_str()));

        let written = File::create(&tmp_path).and_then(|mut tmp| {
            tmp.write_all(&bytes)?;
            tmp.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, &path)) {
            discard_temp(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn read_artifact(&self, id: &SessionId) -> Result<SemanticIndex, FolioError> {
        let bytes = fs::read(self.artifact_path(id))?;
        SemanticIndex::deserialize(&bytes, self.embedder.clone())
    }

    fn remove_artifact(&self, id: &SessionId) -> Result<(), FolioError> {
        match fs::remove_file(self.artifact_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Best-effort removal of a temp artifact left by a failed write.
fn discard_temp(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp artifact"),
    }
}
