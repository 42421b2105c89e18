//! Deterministic in-memory repository adapter.
//!
//! Backs the integration test suite and doubles as a reference for what
//! the engine expects from an adapter: ordered changesets, a browsable
//! tree and content retrieval. All refs share one tree by default;
//! per-ref content overrides model branches that diverge.

use crate::error::{ScmError, ScmResult};
use crate::scm::{Change, Changeset, Entry, Repository, ScmAction};
use crate::types::ChangesetId;
use std::collections::{BTreeMap, BTreeSet};

pub struct MemoryRepository {
    identifier: String,
    branches: Vec<String>,
    tags: Vec<String>,
    supports_cat: bool,
    fail_changesets: bool,
    fail_cat: bool,
    changesets: Vec<Changeset>,
    files: BTreeMap<String, Vec<u8>>,
    ref_files: BTreeMap<String, BTreeMap<String, Option<Vec<u8>>>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            branches: vec!["main".to_string()],
            tags: Vec::new(),
            supports_cat: true,
            fail_changesets: false,
            fail_cat: false,
            changesets: Vec::new(),
            files: BTreeMap::new(),
            ref_files: BTreeMap::new(),
        }
    }

    /// Overrides one path's content at one ref; `None` models a path
    /// absent at that ref while still present on the shared tree.
    pub fn set_ref_file(&mut self, rev: &str, path: &str, content: Option<&str>) {
        self.ref_files
            .entry(rev.to_string())
            .or_default()
            .insert(path.to_string(), content.map(|c| c.as_bytes().to_vec()));
    }

    #[must_use]
    pub fn with_refs(identifier: &str, branches: &[&str], tags: &[&str]) -> Self {
        let mut repo = Self::new(identifier);
        repo.branches = branches.iter().map(|s| (*s).to_string()).collect();
        repo.tags = tags.iter().map(|s| (*s).to_string()).collect();
        repo
    }

    /// A repository without refs; the engine walks its single default tree.
    #[must_use]
    pub fn without_refs(identifier: &str) -> Self {
        Self::with_refs(identifier, &[], &[])
    }

    pub fn set_supports_cat(&mut self, supported: bool) {
        self.supports_cat = supported;
    }

    /// Makes changeset queries fail, to exercise per-repository failure
    /// isolation.
    pub fn set_fail_changesets(&mut self, fail: bool) {
        self.fail_changesets = fail;
    }

    /// Makes content retrieval fail, to exercise per-document failure
    /// recording.
    pub fn set_fail_cat(&mut self, fail: bool) {
        self.fail_cat = fail;
    }

    /// Records a changeset and applies its changes to the tree.
    pub fn commit(&mut self, changes: &[(&str, ScmAction, Option<&str>)]) -> ChangesetId {
        let raw: Vec<(String, ScmAction, Option<Vec<u8>>)> = changes
            .iter()
            .map(|(path, action, content)| {
                (
                    (*path).to_string(),
                    *action,
                    content.map(|c| c.as_bytes().to_vec()),
                )
            })
            .collect();
        self.commit_raw(raw)
    }

    /// `commit` for non-UTF-8 content.
    pub fn commit_raw(
        &mut self,
        changes: Vec<(String, ScmAction, Option<Vec<u8>>)>,
    ) -> ChangesetId {
        let id = ChangesetId::new(self.changesets.len() as i64 + 1);
        let mut recorded = Vec::with_capacity(changes.len());
        for (path, action, content) in changes {
            if action.is_delete() {
                self.files.remove(&path);
            } else {
                self.files.insert(path.clone(), content.unwrap_or_default());
            }
            recorded.push(Change { path, action });
        }
        self.changesets.push(Changeset {
            id,
            revision: format!("r{}", id.as_i64()),
            changes: recorded,
        });
        id
    }
}

impl Repository for MemoryRepository {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn supports_cat(&self) -> bool {
        self.supports_cat
    }

    fn latest_changeset(&self) -> ScmResult<Option<Changeset>> {
        Ok(self.changesets.last().cloned())
    }

    fn changesets_between(&self, from: ChangesetId, to: ChangesetId) -> ScmResult<Vec<Changeset>> {
        if self.fail_changesets {
            return Err(ScmError::Command {
                op: "changesets".into(),
                detail: "injected failure".into(),
            });
        }
        Ok(self
            .changesets
            .iter()
            .filter(|c| c.id > from && c.id <= to)
            .cloned()
            .collect())
    }

    fn entries(&self, path: Option<&str>, _rev: Option<&str>) -> ScmResult<Vec<Entry>> {
        let prefix = match path {
            Some(p) => format!("{}/", p.trim_end_matches('/')),
            None => String::new(),
        };
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for file in self.files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    if dirs.insert(dir.to_string()) {
                        entries.push(Entry {
                            path: format!("{prefix}{dir}"),
                            is_dir: true,
                        });
                    }
                }
                None => entries.push(Entry {
                    path: file.clone(),
                    is_dir: false,
                }),
            }
        }
        Ok(entries)
    }

    fn cat_file(&self, path: &str, rev: Option<&str>) -> ScmResult<Option<Vec<u8>>> {
        if self.fail_cat {
            return Err(ScmError::Command {
                op: "cat".into(),
                detail: "injected failure".into(),
            });
        }
        if let Some(overlay) = rev.and_then(|r| self.ref_files.get(r)) {
            if let Some(content) = overlay.get(path) {
                return Ok(content.clone());
            }
        }
        Ok(self.files.get(path).cloned())
    }

    fn branches(&self) -> ScmResult<Vec<String>> {
        Ok(self.branches.clone())
    }

    fn tags(&self) -> ScmResult<Vec<String>> {
        Ok(self.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_assigns_ascending_ids() {
        let mut repo = MemoryRepository::new("mem");
        let first = repo.commit(&[("a.txt", ScmAction::Add, Some("one"))]);
        let second = repo.commit(&[("b.txt", ScmAction::Add, Some("two"))]);
        assert!(first < second);
        assert_eq!(
            repo.latest_changeset().unwrap().unwrap().id,
            ChangesetId::new(2)
        );
    }

    #[test]
    fn test_entries_lists_directories_once() {
        let mut repo = MemoryRepository::new("mem");
        repo.commit(&[
            ("src/a.rs", ScmAction::Add, Some("a")),
            ("src/b.rs", ScmAction::Add, Some("b")),
            ("README.md", ScmAction::Add, Some("readme")),
        ]);

        let root = repo.entries(None, None).unwrap();
        let dirs: Vec<_> = root.iter().filter(|e| e.is_dir).collect();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].path, "src");

        let src = repo.entries(Some("src"), None).unwrap();
        assert_eq!(src.len(), 2);
        assert!(src.iter().all(Entry::is_file));
    }

    #[test]
    fn test_delete_removes_from_tree() {
        let mut repo = MemoryRepository::new("mem");
        repo.commit(&[("a.txt", ScmAction::Add, Some("one"))]);
        repo.commit(&[("a.txt", ScmAction::Delete, None)]);
        assert!(repo.cat_file("a.txt", None).unwrap().is_none());
    }

    #[test]
    fn test_ref_override_shadows_shared_tree() {
        let mut repo = MemoryRepository::with_refs("mem", &["main", "keep"], &[]);
        repo.commit(&[("a.txt", ScmAction::Add, Some("one"))]);
        repo.set_ref_file("keep", "a.txt", Some("kept"));
        repo.commit(&[("a.txt", ScmAction::Delete, None)]);

        assert!(repo.cat_file("a.txt", Some("main")).unwrap().is_none());
        assert_eq!(
            repo.cat_file("a.txt", Some("keep")).unwrap(),
            Some(b"kept".to_vec())
        );
    }

    #[test]
    fn test_changeset_window_is_half_open() {
        let mut repo = MemoryRepository::new("mem");
        repo.commit(&[("a.txt", ScmAction::Add, Some("1"))]);
        repo.commit(&[("a.txt", ScmAction::Modify, Some("2"))]);
        repo.commit(&[("a.txt", ScmAction::Modify, Some("3"))]);

        let window = repo
            .changesets_between(ChangesetId::new(1), ChangesetId::new(3))
            .unwrap();
        let ids: Vec<_> = window.iter().map(|c| c.id.as_i64()).collect();
        assert_eq!(ids, [2, 3]);
    }
}
