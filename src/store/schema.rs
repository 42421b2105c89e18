//! Schema for per-project index databases.

use crate::error::{StoreError, StoreResult};
use rusqlite::Connection;

/// Current schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// Initializes the document index schema.
///
/// An index created by a different schema version is rejected rather than
/// silently reused; a `reindex --init` rebuild replaces it.
///
/// # Errors
///
/// Returns `StoreError::Sqlite` if schema creation fails and
/// `StoreError::Migration` on a schema version mismatch.
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        ) WITHOUT ROWID;
        "#,
    )?;

    let existing = match conn.query_row(
        "SELECT value FROM schema_info WHERE key = 'version'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(version) => Some(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };
    if let Some(version) = existing {
        if version != SCHEMA_VERSION.to_string() {
            return Err(StoreError::Migration(format!(
                "index has schema version {version}, this build expects {SCHEMA_VERSION}"
            )));
        }
    }

    conn.execute_batch(
        r#"
        -- Indexed documents, one per (repository, revision, path)
        CREATE TABLE IF NOT EXISTS documents (
            doc_id INTEGER PRIMARY KEY AUTOINCREMENT,
            uri TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            repository_id TEXT NOT NULL,
            revision TEXT,
            content_type TEXT,
            body TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        );

        -- Attribute filters hit these directly
        CREATE INDEX IF NOT EXISTS idx_documents_repository
            ON documents(repository_id);

        -- FTS5 virtual table for full-text search
        -- Porter tokenizer for stemming (search -> search, searching)
        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            title,
            body,
            content='documents',
            content_rowid='doc_id',
            tokenize='porter unicode61'
        );

        -- Triggers to keep FTS in sync with the documents table
        CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
            INSERT INTO documents_fts(rowid, title, body)
            VALUES (new.doc_id, new.title, new.body);
        END;

        CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
            INSERT INTO documents_fts(documents_fts, rowid, title, body)
            VALUES ('delete', old.doc_id, old.title, old.body);
        END;

        CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
            INSERT INTO documents_fts(documents_fts, rowid, title, body)
            VALUES ('delete', old.doc_id, old.title, old.body);
            INSERT INTO documents_fts(rowid, title, body)
            VALUES (new.doc_id, new.title, new.body);
        END;

        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::pragmas::apply_pragmas;

    #[test]
    fn test_schema_creation() {
        let conn = Connection::open_in_memory().unwrap();
        apply_pragmas(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(Result::ok)
            .collect();

        assert!(tables.contains(&"documents".to_string()));
        assert!(tables.contains(&"documents_fts".to_string()));
    }

    #[test]
    fn test_reinit_accepts_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute("UPDATE schema_info SET value = '999' WHERE key = 'version'", [])
            .unwrap();

        let err = init_schema(&conn).unwrap_err();
        assert_eq!(err.code(), "MIGRATION_ERROR");
    }
}
