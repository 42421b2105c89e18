//! reposearch: incremental full-text search over version-controlled
//! repositories.
//!
//! This library keeps one embedded FTS5 index per project, incrementally
//! synchronized with the project's repositories:
//! - Full tree walks seed an index; later runs replay only the
//!   changesets committed since the last successful run
//! - A central indexing log carries the per-repository watermark
//! - Searches fan out over the selected projects' indexes and merge
//!   into one globally-ranked, paginated result set
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                CLI (clap)                    │
//! │     reindex, search, remove, stats           │
//! └────────┬────────────────────────┬────────────┘
//!          │                        │
//! ┌────────▼──────────┐   ┌─────────▼───────────┐
//! │  Indexing Engine  │   │    Query Engine     │
//! │ full walk / diff  │   │ tokenize, fan out,  │
//! │ per-run log rows  │   │ merge + paginate    │
//! └───┬──────────┬────┘   └─────────┬───────────┘
//!     │          │                  │
//! ┌───▼─────┐ ┌──▼──────────────────▼───────────┐
//! │   SCM   │ │     Index backend (TextIndex)   │
//! │ adapter │ │  SQLite FTS5, one DB / project  │
//! │  (git)  │ │   + central indexing_log.db     │
//! └─────────┘ │       (r2d2 connection pools)   │
//!             └─────────────────────────────────┘
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod scm;
pub mod services;
pub mod store;
pub mod types;

pub use config::{Config, Policy, Scope};
pub use document::Document;
pub use error::{EngineError, Result};
pub use types::{ChangesetId, DocId, RunStatus, Score};

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Computes the default index root for a given configuration file.
///
/// The root is `<data dir>/reposearch/<hash>` where `<hash>` is the first
/// 16 hex characters of the SHA256 of the configuration path, so two
/// registries sharing a machine never share index databases.
#[must_use]
pub fn default_index_root(config_path: &Path) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(config_path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let hash: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("reposearch")
        .join(hash)
}
