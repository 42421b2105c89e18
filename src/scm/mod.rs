//! Repository adapter boundary.
//!
//! The indexing and query engines never touch a working copy directly;
//! they consume this trait, which exposes tree listing, file content
//! retrieval and changeset queries.

pub mod git;
pub mod memory;

pub use git::GitRepository;
pub use memory::MemoryRepository;

use crate::config::{RepoKind, RepositoryConfig};
use crate::error::ScmResult;
use crate::types::ChangesetId;

/// Version-control action recorded for one path in a changeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmAction {
    Add,
    Modify,
    Replace,
    Copy,
    Delete,
}

/// One path-level change within a changeset.
#[derive(Debug, Clone)]
pub struct Change {
    pub path: String,
    pub action: ScmAction,
}

/// A committed revision with its ordered id and path-level changes.
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: ChangesetId,
    /// Native revision identifier (hash, revision number).
    pub revision: String,
    pub changes: Vec<Change>,
}

/// A directory listing entry.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Repository-relative path.
    pub path: String,
    pub is_dir: bool,
}

impl Entry {
    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}

/// A readable version-controlled repository.
///
/// `changesets_between(from, to)` returns changesets with ids in the
/// half-open window `(from, to]`, ordered ascending — later actions on a
/// path must win when the engine folds them.
pub trait Repository: Send + Sync {
    fn identifier(&self) -> &str;

    /// Whether file content can be retrieved. Repositories without this
    /// capability are skipped with a warning, never indexed.
    fn supports_cat(&self) -> bool {
        true
    }

    fn latest_changeset(&self) -> ScmResult<Option<Changeset>>;

    fn changesets_between(&self, from: ChangesetId, to: ChangesetId) -> ScmResult<Vec<Changeset>>;

    /// Lists direct children of `path` (the root when `None`) at `rev`.
    fn entries(&self, path: Option<&str>, rev: Option<&str>) -> ScmResult<Vec<Entry>>;

    /// Retrieves raw file content at `rev`; `None` when the path does not
    /// exist or cannot be read there.
    fn cat_file(&self, path: &str, rev: Option<&str>) -> ScmResult<Option<Vec<u8>>>;

    /// Branch names; empty for repositories without refs.
    fn branches(&self) -> ScmResult<Vec<String>>;

    fn tags(&self) -> ScmResult<Vec<String>>;

    /// Normalizes an adapter path to the repository-relative form used in
    /// document URIs.
    fn relative_path(&self, path: &str) -> String {
        path.trim_start_matches('/').to_string()
    }
}

impl ScmAction {
    /// Maps the single-letter status used by git and Subversion logs.
    /// Unknown letters are treated as modifications: anything that is not
    /// a deletion leaves the path with current content.
    #[must_use]
    pub fn from_letter(letter: char) -> Self {
        match letter {
            'A' => Self::Add,
            'D' => Self::Delete,
            'R' => Self::Replace,
            'C' => Self::Copy,
            _ => Self::Modify,
        }
    }

    #[must_use]
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete)
    }
}

/// Instantiates the adapter for a configured repository.
#[must_use]
pub fn from_config(config: &RepositoryConfig) -> Box<dyn Repository> {
    match config.kind {
        RepoKind::Git => Box::new(GitRepository::new(&config.id, &config.path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_letter() {
        assert_eq!(ScmAction::from_letter('A'), ScmAction::Add);
        assert_eq!(ScmAction::from_letter('D'), ScmAction::Delete);
        assert_eq!(ScmAction::from_letter('M'), ScmAction::Modify);
        // Unknown status letters degrade to Modify
        assert_eq!(ScmAction::from_letter('X'), ScmAction::Modify);
        assert!(ScmAction::from_letter('D').is_delete());
        assert!(!ScmAction::from_letter('R').is_delete());
    }

    #[test]
    fn test_entry_kind() {
        let dir = Entry {
            path: "src".into(),
            is_dir: true,
        };
        let file = Entry {
            path: "src/lib.rs".into(),
            is_dir: false,
        };
        assert!(!dir.is_file());
        assert!(file.is_file());
    }
}
