//! `SQLite` PRAGMA configuration for index databases.

use crate::error::StoreResult;
use rusqlite::Connection;

/// Executes a single SQL statement that may return rows (PRAGMAs do).
fn exec_stmt(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    conn.prepare(sql)?.query([])?.next()?;
    Ok(())
}

/// Applies performance-tuned PRAGMA settings.
///
/// WAL keeps concurrent readers working while an indexing run writes;
/// the busy timeout bounds cross-process writer overlap.
///
/// # Errors
///
/// Returns `StoreError::Sqlite` if any PRAGMA statement fails.
pub fn apply_pragmas(conn: &Connection) -> StoreResult<()> {
    // WAL mode enables concurrent readers during writes
    exec_stmt(conn, "PRAGMA journal_mode = WAL")?;
    // Synchronous NORMAL is safe with WAL, faster than FULL
    exec_stmt(conn, "PRAGMA synchronous = NORMAL")?;
    // 8MB page cache
    exec_stmt(conn, "PRAGMA cache_size = -8000")?;
    // 64MB memory-mapped I/O for faster reads
    exec_stmt(conn, "PRAGMA mmap_size = 67108864")?;
    // 5 second busy timeout for lock contention
    exec_stmt(conn, "PRAGMA busy_timeout = 5000")?;
    // Temp tables in memory
    exec_stmt(conn, "PRAGMA temp_store = MEMORY")?;

    Ok(())
}
