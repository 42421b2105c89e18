//! Repository tree traversal.
//!
//! `TreeWalk` enumerates every file path reachable from the root of one
//! ref, lazily, with an explicit directory worklist instead of recursion:
//! pathological tree depth costs heap, never stack.

use crate::error::ScmResult;
use crate::scm::Repository;

/// Refs to walk for a full rebuild: branches, then tags when enabled.
/// A repository with no branches yields a single unnamed ref so its
/// default tree is still walked.
///
/// # Errors
///
/// Returns `ScmError` if ref enumeration fails.
pub fn refs(repo: &dyn Repository, walk_tags: bool) -> ScmResult<Vec<Option<String>>> {
    let branches = repo.branches()?;
    if branches.is_empty() {
        return Ok(vec![None]);
    }
    let mut refs: Vec<Option<String>> = branches.into_iter().map(Some).collect();
    if walk_tags {
        refs.extend(repo.tags()?.into_iter().map(Some));
    }
    Ok(refs)
}

/// Lazy depth-first enumeration of file paths under one ref.
pub struct TreeWalk<'a> {
    repo: &'a dyn Repository,
    rev: Option<String>,
    /// Directories still to list; `None` is the repository root.
    dirs: Vec<Option<String>>,
    /// Files discovered but not yet yielded.
    files: Vec<String>,
}

impl<'a> TreeWalk<'a> {
    #[must_use]
    pub fn new(repo: &'a dyn Repository, rev: Option<&str>) -> Self {
        Self {
            repo,
            rev: rev.map(str::to_string),
            dirs: vec![None],
            files: Vec::new(),
        }
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = ScmResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.files.pop() {
                return Some(Ok(self.repo.relative_path(&file)));
            }
            let dir = self.dirs.pop()?;
            let entries = match self.repo.entries(dir.as_deref(), self.rev.as_deref()) {
                Ok(entries) => entries,
                Err(e) => return Some(Err(e)),
            };
            for entry in entries {
                if entry.is_dir {
                    self.dirs.push(Some(entry.path));
                } else {
                    self.files.push(entry.path);
                }
            }
        }
    }
}
