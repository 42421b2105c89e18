//! Common test utilities for reposearch integration tests.
//!
//! Provides `TestEnv`: a temp index root with the indexing log and
//! per-project on-disk indexes wired together, driven by in-memory
//! repositories.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use reposearch::config::Policy;
use reposearch::scm::{MemoryRepository, Repository, ScmAction};
use reposearch::services::{Indexer, ProjectIndex, RunSummary};
use reposearch::store::{FtsIndex, IndexingLog, OpenMode};
use tempfile::TempDir;

/// An isolated index root with its indexing log.
pub struct TestEnv {
    pub dir: TempDir,
    pub log: IndexingLog,
    pub policy: Policy,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let log = IndexingLog::open(dir.path()).expect("Failed to open indexing log");
        Self {
            dir,
            log,
            policy: Policy::default(),
        }
    }

    /// Opens (creating if needed) a project's index for writing.
    pub fn open_index(&self, project_id: &str) -> FtsIndex {
        FtsIndex::open(self.dir.path(), project_id, OpenMode::ReadWrite)
            .expect("Failed to open index")
    }

    /// Runs one indexing pass of `repo` into `project_id`'s index.
    pub fn index(&self, project_id: &str, repo: &dyn Repository) -> RunSummary {
        self.index_with(project_id, repo, false)
    }

    pub fn index_with(&self, project_id: &str, repo: &dyn Repository, force_full: bool) -> RunSummary {
        let index = self.open_index(project_id);
        let indexer = Indexer::new(&index, &self.log, project_id, &self.policy);
        let summary = indexer
            .index_repository(repo, force_full)
            .expect("Indexing run failed");
        index.close().expect("Failed to close index");
        summary
    }

    /// Opens a read handle the way the search path does.
    pub fn read_handle(&self, project_id: &str) -> ProjectIndex {
        let index = FtsIndex::open(self.dir.path(), project_id, OpenMode::Read)
            .expect("Failed to open index for reading");
        ProjectIndex::from_parts(project_id.to_string(), index)
    }
}

/// A repository seeded with a small two-file tree on `main`.
pub fn seeded_repo(identifier: &str) -> MemoryRepository {
    let mut repo = MemoryRepository::new(identifier);
    repo.commit(&[
        ("a.txt", ScmAction::Add, Some("hello alpha")),
        ("docs/b.txt", ScmAction::Add, Some("world beta")),
    ]);
    repo
}
