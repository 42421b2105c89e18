//! Index backend: per-project full-text index handles.
//!
//! `TextIndex` is the capability surface the engines consume; `FtsIndex`
//! is the embedded SQLite FTS5 implementation. A handle owns a pooled
//! connection resource that is released exactly once, by `close` (or by
//! drop as a backstop).

mod log;
pub mod pragmas;
mod schema;

pub use log::{IndexingLog, LogEntry};
pub use pragmas::apply_pragmas;
pub use schema::{init_schema, SCHEMA_VERSION};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::types::{DocId, Score};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::path::{Path, PathBuf};

/// How an index handle is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Search only; fails if the index was never created.
    Read,
    /// Indexing; creates the index on first use.
    ReadWrite,
}

/// Optional exact-match attribute constraints for a search.
///
/// An absent value means "no constraint", never "must be empty".
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub repository: Option<String>,
    pub revision: Option<String>,
    pub content_type: Option<String>,
}

/// Capability surface of a text index backend.
///
/// The embedded SQLite implementation is the only variant shipped; a
/// remote index server would plug in here.
pub trait TextIndex: Send + Sync {
    fn put_document(&self, doc: &Document) -> StoreResult<DocId>;
    fn delete_document(&self, id: DocId) -> StoreResult<()>;
    fn uri_to_id(&self, uri: &str) -> StoreResult<Option<DocId>>;
    fn get_document(&self, id: DocId) -> StoreResult<Option<Document>>;
    /// Ranked phrase search; `phrase` uses the backend's boolean query
    /// grammar, filters are exact-match attribute constraints.
    fn search(&self, phrase: &str, filters: &Filters) -> StoreResult<Vec<(DocId, Score)>>;
    fn optimize(&self) -> StoreResult<()>;
    fn doc_num(&self) -> StoreResult<u64>;
}

/// Embedded SQLite FTS5 index for one project.
///
/// Uses r2d2 because `rusqlite::Connection` is not Sync; the pool manages
/// thread-safe access for concurrent readers.
#[derive(Debug)]
pub struct FtsIndex {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl FtsIndex {
    /// Index database location for a project.
    #[must_use]
    pub fn database_path(root: &Path, project_id: &str) -> PathBuf {
        root.join(project_id).join("index.db")
    }

    /// Opens (and in `ReadWrite` mode creates) a project's index.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when opening in `Read` mode and
    /// the index has never been created, or when the pool cannot be built.
    pub fn open(root: &Path, project_id: &str, mode: OpenMode) -> StoreResult<Self> {
        let path = Self::database_path(root, project_id);

        let manager = match mode {
            OpenMode::Read => {
                if !path.exists() {
                    return Err(StoreError::Unavailable {
                        path,
                        reason: "index has not been created".into(),
                    });
                }
                SqliteConnectionManager::file(&path)
                    .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI)
            }
            OpenMode::ReadWrite => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                SqliteConnectionManager::file(&path)
            }
        };

        let pool = Pool::builder()
            .max_size(4)
            .min_idle(Some(1))
            .build(manager)
            .map_err(|e| StoreError::Unavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            if mode == OpenMode::ReadWrite {
                init_schema(&conn)?;
            }
        }

        Ok(Self { pool, path })
    }

    /// Creates an in-memory index (for testing).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Pool` if connection pool creation fails.
    pub fn in_memory() -> StoreResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let conn = pool.get()?;
            apply_pragmas(&conn)?;
            init_schema(&conn)?;
        }
        Ok(Self {
            pool,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Releases the handle. Consumes self so the resource is released
    /// exactly once on every exit path.
    #[allow(clippy::unnecessary_wraps)]
    pub fn close(self) -> StoreResult<()> {
        drop(self.pool);
        Ok(())
    }

    /// Destroys a project's index files on disk. The handle must not be
    /// open elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the index directory cannot be removed.
    pub fn remove(root: &Path, project_id: &str) -> StoreResult<()> {
        let dir = root.join(project_id);
        if dir.exists() {
            tracing::info!(path = %dir.display(), "removing index");
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(StoreError::from)
    }
}

impl TextIndex for FtsIndex {
    fn put_document(&self, doc: &Document) -> StoreResult<DocId> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO documents (uri, title, repository_id, revision, content_type, body, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ",
            rusqlite::params![
                doc.uri,
                doc.title,
                doc.repository_id,
                doc.revision,
                doc.content_type,
                doc.body
            ],
        )?;
        Ok(DocId::new(conn.last_insert_rowid()))
    }

    fn delete_document(&self, id: DocId) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM documents WHERE doc_id = ?1",
            rusqlite::params![id.as_i64()],
        )?;
        Ok(())
    }

    fn uri_to_id(&self, uri: &str) -> StoreResult<Option<DocId>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT doc_id FROM documents WHERE uri = ?1",
            rusqlite::params![uri],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(id) => Ok(Some(DocId::new(id))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn get_document(&self, id: DocId) -> StoreResult<Option<Document>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r"
            SELECT uri, title, repository_id, revision, content_type, body
            FROM documents WHERE doc_id = ?1
            ",
            rusqlite::params![id.as_i64()],
            |row| {
                Ok(Document {
                    uri: row.get(0)?,
                    title: row.get(1)?,
                    repository_id: row.get(2)?,
                    revision: row.get(3)?,
                    content_type: row.get(4)?,
                    body: row.get(5)?,
                })
            },
        );
        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn search(&self, phrase: &str, filters: &Filters) -> StoreResult<Vec<(DocId, Score)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT d.doc_id, bm25(documents_fts, 2.0, 1.0) AS rank
            FROM documents_fts
            JOIN documents d ON documents_fts.rowid = d.doc_id
            WHERE documents_fts MATCH ?1
              AND (?2 IS NULL OR d.repository_id = ?2)
              AND (?3 IS NULL OR d.revision = ?3)
              AND (?4 IS NULL OR d.content_type = ?4)
            ORDER BY rank
            ",
        )?;

        let results = stmt
            .query_map(
                rusqlite::params![
                    phrase,
                    filters.repository,
                    filters.revision,
                    filters.content_type
                ],
                |row| {
                    Ok((
                        DocId::new(row.get::<_, i64>(0)?),
                        Score::from_bm25(row.get::<_, f64>(1)?),
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }

    fn optimize(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        // Consolidate FTS5 segments, then refresh planner statistics
        conn.prepare("INSERT INTO documents_fts(documents_fts) VALUES('optimize')")?
            .execute([])?;
        conn.execute("ANALYZE", [])?;
        Ok(())
    }

    fn doc_num(&self) -> StoreResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

// Compile-time assertion for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FtsIndex>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(uri: &str, body: &str) -> Document {
        Document {
            uri: uri.to_string(),
            title: uri.to_string(),
            repository_id: "main".to_string(),
            revision: Some("trunk".to_string()),
            content_type: Some("text/plain".to_string()),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_put_get_delete_roundtrip() {
        let index = FtsIndex::in_memory().unwrap();

        let id = index.put_document(&doc("/e/a.txt", "hello world")).unwrap();
        assert_eq!(index.uri_to_id("/e/a.txt").unwrap(), Some(id));

        let stored = index.get_document(id).unwrap().unwrap();
        assert_eq!(stored.body, "hello world");
        assert_eq!(stored.revision.as_deref(), Some("trunk"));

        index.delete_document(id).unwrap();
        assert!(index.uri_to_id("/e/a.txt").unwrap().is_none());
        assert!(index.get_document(id).unwrap().is_none());
        assert_eq!(index.doc_num().unwrap(), 0);
    }

    #[test]
    fn test_uri_is_unique() {
        let index = FtsIndex::in_memory().unwrap();
        index.put_document(&doc("/e/a.txt", "one")).unwrap();
        // Engine replaces by delete-then-add; a raw duplicate insert must fail
        assert!(index.put_document(&doc("/e/a.txt", "two")).is_err());
    }

    #[test]
    fn test_search_matches_body() {
        let index = FtsIndex::in_memory().unwrap();
        index
            .put_document(&doc("/e/a.txt", "authentication flow"))
            .unwrap();
        index.put_document(&doc("/e/b.txt", "nothing here")).unwrap();

        let hits = index.search("\"authentication\"", &Filters::default()).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_search_respects_filters() {
        let index = FtsIndex::in_memory().unwrap();
        index.put_document(&doc("/e/a.txt", "needle")).unwrap();
        let mut other = doc("/e/b.txt", "needle");
        other.repository_id = "vendor".to_string();
        other.revision = Some("v1".to_string());
        index.put_document(&other).unwrap();

        let all = index.search("\"needle\"", &Filters::default()).unwrap();
        assert_eq!(all.len(), 2);

        let filtered = index
            .search(
                "\"needle\"",
                &Filters {
                    repository: Some("vendor".to_string()),
                    ..Filters::default()
                },
            )
            .unwrap();
        assert_eq!(filtered.len(), 1);
        let found = index.get_document(filtered[0].0).unwrap().unwrap();
        assert_eq!(found.uri, "/e/b.txt");

        let none = index
            .search(
                "\"needle\"",
                &Filters {
                    revision: Some("ghost".to_string()),
                    ..Filters::default()
                },
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_empty_body_is_indexable() {
        let index = FtsIndex::in_memory().unwrap();
        let id = index.put_document(&doc("/e/empty.txt", "")).unwrap();
        assert_eq!(index.get_document(id).unwrap().unwrap().body, "");
    }

    #[test]
    fn test_read_mode_requires_existing_index() {
        let root = TempDir::new().unwrap();
        let err = FtsIndex::open(root.path(), "ghost", OpenMode::Read).unwrap_err();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");
    }

    #[test]
    fn test_readwrite_creates_then_read_opens() {
        let root = TempDir::new().unwrap();

        let index = FtsIndex::open(root.path(), "proj", OpenMode::ReadWrite).unwrap();
        index.put_document(&doc("/e/a.txt", "persisted")).unwrap();
        index.close().unwrap();

        let reader = FtsIndex::open(root.path(), "proj", OpenMode::Read).unwrap();
        assert_eq!(reader.doc_num().unwrap(), 1);
        reader.close().unwrap();
    }

    #[test]
    fn test_remove_wipes_index() {
        let root = TempDir::new().unwrap();
        let index = FtsIndex::open(root.path(), "proj", OpenMode::ReadWrite).unwrap();
        index.put_document(&doc("/e/a.txt", "x")).unwrap();
        index.close().unwrap();

        FtsIndex::remove(root.path(), "proj").unwrap();
        assert!(FtsIndex::open(root.path(), "proj", OpenMode::Read).is_err());
        // Removing an already-absent index is fine
        FtsIndex::remove(root.path(), "proj").unwrap();
    }

    #[test]
    fn test_optimize_runs() {
        let index = FtsIndex::in_memory().unwrap();
        index.put_document(&doc("/e/a.txt", "content")).unwrap();
        index.optimize().unwrap();
    }
}
