//! Incremental change detection.
//!
//! Folds the changesets between two watermarks into one action per path.
//! Later changesets win: a file added then deleted within the window
//! yields a single delete, and the reverse yields a single add-or-update.

use crate::error::ScmResult;
use crate::scm::Repository;
use crate::types::{ActionKind, ChangesetId};
use std::collections::HashMap;

/// Result of comparing the indexed watermark against the repository head.
#[derive(Debug)]
pub enum DiffOutcome {
    /// The watermark is at or past the head; nothing to do.
    AlreadyIndexed,
    /// Net per-path actions, one per touched path.
    Changes(Vec<(String, ActionKind)>),
}

/// Computes the net work list for the window `(since, current]`.
///
/// # Errors
///
/// Returns `ScmError` if the changeset query fails.
pub fn detect(
    repo: &dyn Repository,
    since: ChangesetId,
    current: ChangesetId,
) -> ScmResult<DiffOutcome> {
    if since >= current {
        return Ok(DiffOutcome::AlreadyIndexed);
    }

    let changesets = repo.changesets_between(since, current)?;

    let mut folded: HashMap<String, ActionKind> = HashMap::new();
    for changeset in &changesets {
        for change in &changeset.changes {
            let action = if change.action.is_delete() {
                ActionKind::Delete
            } else {
                ActionKind::AddOrUpdate
            };
            folded.insert(repo.relative_path(&change.path), action);
        }
    }

    // Deterministic order keeps runs reproducible and logs readable
    let mut actions: Vec<(String, ActionKind)> = folded.into_iter().collect();
    actions.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(DiffOutcome::Changes(actions))
}
