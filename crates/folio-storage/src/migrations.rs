//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use folio_core::error::FolioError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), FolioError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| FolioError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| FolioError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: sessions");
    }

    Ok(())
}

/// Version 1: session records.
///
/// `record` holds the JSON-encoded session; `last_activity` is duplicated
/// as a column for ordering and inspection only.
fn apply_v1(conn: &Connection) -> Result<(), FolioError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            session_id      TEXT PRIMARY KEY NOT NULL,
            record          TEXT NOT NULL,
            last_activity   INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_last_activity
            ON sessions (last_activity ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'sessions');
        ",
    )
    .map_err(|e| FolioError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
