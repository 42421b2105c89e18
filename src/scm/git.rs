//! Git repository adapter, shelling out to the `git` binary.
//!
//! Changeset ids must be ordered integers, which git hashes are not: the
//! adapter assigns each commit its 1-based position in the date-ordered
//! `rev-list --all` enumeration and keeps the hash as the revision string.

use crate::error::{ScmError, ScmResult};
use crate::scm::{Change, Changeset, Entry, Repository, ScmAction};
use crate::types::ChangesetId;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct GitRepository {
    identifier: String,
    root: PathBuf,
}

impl GitRepository {
    #[must_use]
    pub fn new(identifier: &str, root: &Path) -> Self {
        Self {
            identifier: identifier.to_string(),
            root: root.to_path_buf(),
        }
    }

    fn run(&self, args: &[&str]) -> ScmResult<Vec<u8>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(ScmError::Command {
                op: args.join(" "),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn run_lines(&self, args: &[&str]) -> ScmResult<Vec<String>> {
        let stdout = self.run(args)?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::to_string)
            .filter(|l| !l.is_empty())
            .collect())
    }

    /// All commit hashes, oldest first. Position + 1 is the changeset id.
    fn rev_list_all(&self) -> ScmResult<Vec<String>> {
        self.run_lines(&["rev-list", "--all", "--date-order", "--reverse"])
    }

    fn changeset_at(&self, id: ChangesetId, hash: &str) -> ScmResult<Changeset> {
        let lines = self.run_lines(&[
            "diff-tree",
            "--no-commit-id",
            "--name-status",
            "-r",
            "--root",
            hash,
        ])?;
        let mut changes = Vec::new();
        for line in lines {
            let mut fields = line.split('\t');
            let status = fields
                .next()
                .and_then(|s| s.chars().next())
                .ok_or_else(|| ScmError::Parse(format!("bad diff-tree line: {line}")))?;
            let first = fields
                .next()
                .ok_or_else(|| ScmError::Parse(format!("diff-tree line without path: {line}")))?;
            match fields.next() {
                // Rename/copy rows carry two paths: the new path gets the
                // action, a rename additionally deletes the old path.
                Some(new_path) => {
                    if status == 'R' {
                        changes.push(Change {
                            path: first.to_string(),
                            action: ScmAction::Delete,
                        });
                    }
                    changes.push(Change {
                        path: new_path.to_string(),
                        action: ScmAction::from_letter(status),
                    });
                }
                None => changes.push(Change {
                    path: first.to_string(),
                    action: ScmAction::from_letter(status),
                }),
            }
        }
        Ok(Changeset {
            id,
            revision: hash.to_string(),
            changes,
        })
    }
}

impl Repository for GitRepository {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn latest_changeset(&self) -> ScmResult<Option<Changeset>> {
        let hashes = self.rev_list_all()?;
        match hashes.last() {
            Some(hash) => Ok(Some(
                self.changeset_at(ChangesetId::new(hashes.len() as i64), hash)?,
            )),
            None => Ok(None),
        }
    }

    fn changesets_between(&self, from: ChangesetId, to: ChangesetId) -> ScmResult<Vec<Changeset>> {
        let hashes = self.rev_list_all()?;
        let lo = from.as_i64().max(0) as usize;
        let hi = (to.as_i64().max(0) as usize).min(hashes.len());
        let mut changesets = Vec::with_capacity(hi.saturating_sub(lo));
        for (idx, hash) in hashes.iter().enumerate().take(hi).skip(lo) {
            changesets.push(self.changeset_at(ChangesetId::new(idx as i64 + 1), hash)?);
        }
        Ok(changesets)
    }

    fn entries(&self, path: Option<&str>, rev: Option<&str>) -> ScmResult<Vec<Entry>> {
        let rev = rev.unwrap_or("HEAD");
        // A trailing slash makes ls-tree list the directory's children with
        // full repository-relative paths.
        let target = path.map(|p| format!("{}/", p.trim_end_matches('/')));
        let mut args = vec!["ls-tree", rev];
        if let Some(ref t) = target {
            args.push(t);
        }
        let lines = self.run_lines(&args)?;
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let Some((meta, entry_path)) = line.split_once('\t') else {
                return Err(ScmError::Parse(format!("bad ls-tree line: {line}")));
            };
            let kind = meta.split_whitespace().nth(1).unwrap_or("");
            match kind {
                "blob" => entries.push(Entry {
                    path: entry_path.to_string(),
                    is_dir: false,
                }),
                "tree" => entries.push(Entry {
                    path: entry_path.to_string(),
                    is_dir: true,
                }),
                // Submodules and other oddities are not indexable files.
                _ => {}
            }
        }
        Ok(entries)
    }

    fn cat_file(&self, path: &str, rev: Option<&str>) -> ScmResult<Option<Vec<u8>>> {
        let rev = rev.unwrap_or("HEAD");
        let target = format!("{rev}:{path}");
        match self.run(&["show", &target]) {
            Ok(bytes) => Ok(Some(bytes)),
            // Missing path at this rev, or not a blob; either way there is
            // no content to index.
            Err(ScmError::Command { detail, .. }) => {
                tracing::debug!(path, rev, detail, "cat failed, treating as absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn branches(&self) -> ScmResult<Vec<String>> {
        self.run_lines(&["for-each-ref", "--format=%(refname:short)", "refs/heads/"])
    }

    fn tags(&self) -> ScmResult<Vec<String>> {
        self.run_lines(&["for-each-ref", "--format=%(refname:short)", "refs/tags/"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Repository-level behavior is covered by the integration tests with
    // the memory adapter; here we only exercise the parsing seams against
    // a throwaway real repository when git is available.

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", "t")
            .env("GIT_AUTHOR_EMAIL", "t@t")
            .env("GIT_COMMITTER_NAME", "t")
            .env("GIT_COMMITTER_EMAIL", "t@t")
            .status()
            .expect("git not runnable");
        assert!(status.success(), "git {args:?} failed");
    }

    fn fixture() -> (tempfile::TempDir, GitRepository) {
        let dir = tempfile::TempDir::new().unwrap();
        git(dir.path(), &["init", "-q", "-b", "main"]);
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-q", "-m", "initial"]);
        let repo = GitRepository::new("main", dir.path());
        (dir, repo)
    }

    #[test]
    fn test_latest_changeset_and_entries() {
        let (_dir, repo) = fixture();

        let latest = repo.latest_changeset().unwrap().unwrap();
        assert_eq!(latest.id, ChangesetId::new(1));
        assert_eq!(latest.changes.len(), 2);

        let root = repo.entries(None, None).unwrap();
        let names: Vec<_> = root.iter().map(|e| e.path.as_str()).collect();
        assert!(names.contains(&"README.md"));
        assert!(names.contains(&"src"));

        let src = repo.entries(Some("src"), None).unwrap();
        assert_eq!(src.len(), 1);
        assert_eq!(src[0].path, "src/lib.rs");
        assert!(src[0].is_file());
    }

    #[test]
    fn test_cat_and_diff_window() {
        let (dir, repo) = fixture();

        std::fs::write(dir.path().join("src/lib.rs"), "pub fn g() {}").unwrap();
        std::fs::remove_file(dir.path().join("README.md")).unwrap();
        git(dir.path(), &["add", "-A"]);
        git(dir.path(), &["commit", "-q", "-m", "second"]);

        let window = repo
            .changesets_between(ChangesetId::new(1), ChangesetId::new(2))
            .unwrap();
        assert_eq!(window.len(), 1);
        let actions: Vec<_> = window[0]
            .changes
            .iter()
            .map(|c| (c.path.as_str(), c.action))
            .collect();
        assert!(actions.contains(&("README.md", ScmAction::Delete)));
        assert!(actions.contains(&("src/lib.rs", ScmAction::Modify)));

        let content = repo.cat_file("src/lib.rs", None).unwrap().unwrap();
        assert_eq!(content, b"pub fn g() {}");
        assert!(repo.cat_file("README.md", None).unwrap().is_none());
    }

    #[test]
    fn test_branches_listed() {
        let (_dir, repo) = fixture();
        assert_eq!(repo.branches().unwrap(), vec!["main".to_string()]);
        assert!(repo.tags().unwrap().is_empty());
    }
}
