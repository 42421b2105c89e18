//! Error types for reposearch.
//!
//! Uses thiserror for ergonomic error handling with proper
//! error chain propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Index backend error: {0}")]
    Store(#[from] StoreError),

    #[error("Source control error: {0}")]
    Scm(#[from] ScmError),

    #[error("Indexing error: {0}")]
    Index(#[from] IndexError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Project not found: {id}")]
    ProjectNotFound { id: String },

    #[error("Project has no supported repository: {id}")]
    NoSupportedRepository { id: String },
}

/// Index backend errors.
///
/// Open and close failures are fatal for the current run and surface as
/// backend-unavailable; they never corrupt the indexing log.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Index unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Index file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Repository adapter errors.
#[derive(Error, Debug)]
pub enum ScmError {
    #[error("SCM command failed ({op}): {detail}")]
    Command { op: String, detail: String },

    #[error("SCM output parse error: {0}")]
    Parse(String),

    #[error("Failed to run SCM command: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Indexing run errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Document write failed for {uri}: {reason}")]
    Document { uri: String, reason: String },
}

/// Search operation errors.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Index backend error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for backend operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for repository adapter operations.
pub type ScmResult<T> = std::result::Result<T, ScmError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

// Error code implementations for machine-readable error responses
impl EngineError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.code(),
            Self::Scm(e) => e.code(),
            Self::Index(e) => e.code(),
            Self::Search(e) => e.code(),
            Self::Io(_) => "IO_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            Self::NoSupportedRepository { .. } => "NO_SUPPORTED_REPOSITORY",
        }
    }

    /// Maps the error to the HTTP-style status of the service boundary:
    /// 404 for unknown or unsupported targets, 500 for everything else.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ProjectNotFound { .. } | Self::NoSupportedRepository { .. } => 404,
            _ => 500,
        }
    }
}

impl StoreError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Pool(_) => "POOL_ERROR",
            Self::Unavailable { .. } => "BACKEND_UNAVAILABLE",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Io(_) => "INDEX_IO_ERROR",
        }
    }
}

impl ScmError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Command { .. } => "SCM_COMMAND_FAILED",
            Self::Parse(_) => "SCM_PARSE_ERROR",
            Self::Spawn(_) => "SCM_SPAWN_ERROR",
        }
    }
}

impl IndexError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Document { .. } => "DOCUMENT_WRITE_FAILED",
        }
    }
}

impl SearchError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        let not_found = EngineError::ProjectNotFound {
            id: "ghost".into(),
        };
        assert_eq!(not_found.http_status(), 404);

        let unsupported = EngineError::NoSupportedRepository { id: "p1".into() };
        assert_eq!(unsupported.http_status(), 404);

        let backend = EngineError::Store(StoreError::Unavailable {
            path: PathBuf::from("/nope"),
            reason: "missing".into(),
        });
        assert_eq!(backend.http_status(), 500);
    }

    #[test]
    fn test_error_codes() {
        let err = EngineError::Store(StoreError::Migration("v2".into()));
        assert_eq!(err.code(), "MIGRATION_ERROR");

        let err: EngineError = ScmError::Command {
            op: "rev-list".into(),
            detail: "exit 128".into(),
        }
        .into();
        assert_eq!(err.code(), "SCM_COMMAND_FAILED");

        let err: EngineError = IndexError::Document {
            uri: "/projects/p/repository/r/entry/a.txt".into(),
            reason: "disk full".into(),
        }
        .into();
        assert_eq!(err.code(), "DOCUMENT_WRITE_FAILED");
    }
}
