//! Persistent indexing log.
//!
//! One central database at the index root records every indexing attempt.
//! The most recent SUCCESS row per repository is the watermark the next
//! incremental run diffs from. Rows are append-only: a run's row is
//! pre-committed at start (a crash leaves a FAILED trace) and finalized in
//! place at run end; rows are only ever bulk-marked REMOVED when the
//! backing index is destroyed.

use crate::error::{StoreError, StoreResult};
use crate::types::{ChangesetId, RunStatus};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

/// One recorded indexing attempt.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: i64,
    pub project_id: String,
    pub repository_id: String,
    /// The changeset the run advanced to.
    pub changeset_id: ChangesetId,
    /// Native revision identifier of that changeset.
    pub revision: String,
    pub status: RunStatus,
    pub message: String,
    pub created_at: String,
}

/// Handle to the central indexing log database.
pub struct IndexingLog {
    pool: Pool<SqliteConnectionManager>,
}

impl IndexingLog {
    /// Opens (creating if needed) the log database under `root`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or migrated.
    pub fn open(root: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(root)?;
        let manager = SqliteConnectionManager::file(root.join("indexing_log.db"));
        Self::build(manager)
    }

    /// Creates an in-memory log (for testing).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if pool creation fails.
    pub fn in_memory() -> StoreResult<Self> {
        Self::build(SqliteConnectionManager::memory())
    }

    fn build(manager: SqliteConnectionManager) -> StoreResult<Self> {
        let pool = Pool::builder().max_size(2).build(manager)?;
        {
            let conn = pool.get()?;
            super::pragmas::apply_pragmas(&conn)?;
            conn.execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS indexing_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id TEXT NOT NULL,
                    repository_id TEXT NOT NULL,
                    changeset_id INTEGER NOT NULL,
                    revision TEXT NOT NULL,
                    status TEXT NOT NULL,
                    message TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_log_repository
                    ON indexing_log(project_id, repository_id, status);
                ",
            )?;
        }
        Ok(Self { pool })
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(StoreError::from)
    }

    /// Pre-commits a row for a starting run and returns its id.
    ///
    /// The row starts as FAILED so an aborted run leaves an honest trace;
    /// `finalize` rewrites status and message when the run completes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the insert fails.
    pub fn begin(
        &self,
        project_id: &str,
        repository_id: &str,
        changeset_id: ChangesetId,
        revision: &str,
    ) -> StoreResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            r"
            INSERT INTO indexing_log
                (project_id, repository_id, changeset_id, revision, status, message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'run started', datetime('now'))
            ",
            rusqlite::params![
                project_id,
                repository_id,
                changeset_id.as_i64(),
                revision,
                RunStatus::Failed.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Finalizes a pre-committed row with the run's outcome.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the update fails.
    pub fn finalize(&self, id: i64, status: RunStatus, message: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE indexing_log SET status = ?1, message = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), message, id],
        )?;
        Ok(())
    }

    /// Most recent SUCCESS entry for a repository: the watermark.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the query fails.
    pub fn latest_success(
        &self,
        project_id: &str,
        repository_id: &str,
    ) -> StoreResult<Option<LogEntry>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            r"
            SELECT id, project_id, repository_id, changeset_id, revision, status, message, created_at
            FROM indexing_log
            WHERE project_id = ?1 AND repository_id = ?2 AND status = 'success'
            ORDER BY id DESC
            LIMIT 1
            ",
            rusqlite::params![project_id, repository_id],
            Self::row_to_entry,
        );
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    /// Whether any repository of the project has ever been indexed
    /// successfully. Projects without one are skipped by search.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the query fails.
    pub fn has_success(&self, project_id: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM indexing_log WHERE project_id = ?1 AND status = 'success'",
            rusqlite::params![project_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Bulk-marks a repository's rows REMOVED after its index is wiped.
    /// Returns the number of rows marked.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the update fails.
    pub fn mark_removed(&self, project_id: &str, repository_id: &str) -> StoreResult<u64> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE indexing_log SET status = ?1 WHERE project_id = ?2 AND repository_id = ?3",
            rusqlite::params![RunStatus::Removed.as_str(), project_id, repository_id],
        )?;
        Ok(rows as u64)
    }

    /// Entries for a repository, newest first (diagnostics).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Sqlite` if the query fails.
    pub fn entries(&self, project_id: &str, repository_id: &str) -> StoreResult<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            r"
            SELECT id, project_id, repository_id, changeset_id, revision, status, message, created_at
            FROM indexing_log
            WHERE project_id = ?1 AND repository_id = ?2
            ORDER BY id DESC
            ",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![project_id, repository_id], Self::row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
        let status: String = row.get(5)?;
        Ok(LogEntry {
            id: row.get(0)?,
            project_id: row.get(1)?,
            repository_id: row.get(2)?,
            changeset_id: ChangesetId::new(row.get(3)?),
            revision: row.get(4)?,
            status: RunStatus::parse(&status).unwrap_or(RunStatus::Failed),
            message: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
