//! Indexing engine: full rebuilds and incremental runs.
//!
//! One `Indexer` run covers one repository. The run decides between a
//! full tree walk (no prior SUCCESS watermark, or `init`) and an
//! incremental diff against the watermark, applies document writes with
//! per-document failure isolation, and records the outcome in the
//! indexing log. The log row is pre-committed at run start so an abort
//! leaves a FAILED trace instead of silence.

use crate::config::{Config, Policy};
use crate::document::{content_type_of, document_uri, Document};
use crate::error::{EngineError, IndexError, Result};
use crate::scm::{self, Repository};
use crate::services::changes::{self, DiffOutcome};
use crate::services::walker::{self, TreeWalk};
use crate::store::{FtsIndex, IndexingLog, OpenMode, TextIndex};
use crate::types::{ActionKind, ChangesetId, RunStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of one repository indexing run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub repository_id: String,
    pub status: RunStatus,
    /// Changeset the run advanced to; `None` for an empty repository.
    pub changeset: Option<ChangesetId>,
    pub revision: Option<String>,
    pub added: u64,
    pub deleted: u64,
    pub failed: u64,
    pub message: String,
}

/// Outcome of reindexing every repository of a project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub runs: Vec<RunSummary>,
}

impl ProjectSummary {
    /// True when every repository run finished SUCCESS.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.runs.iter().all(|r| r.status == RunStatus::Success)
    }
}

/// Mutable state of one in-flight run, threaded through the write path.
#[derive(Debug, Default)]
struct IndexingRun {
    added: u64,
    deleted: u64,
    failures: Vec<IndexError>,
}

impl IndexingRun {
    fn record_failure(&mut self, uri: &str, reason: &str) {
        warn!(uri, reason, "document write failed");
        self.failures.push(IndexError::Document {
            uri: uri.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Indexes one repository into one project index.
pub struct Indexer<'a> {
    index: &'a dyn TextIndex,
    log: &'a IndexingLog,
    project_id: &'a str,
    policy: &'a Policy,
}

impl<'a> Indexer<'a> {
    #[must_use]
    pub fn new(
        index: &'a dyn TextIndex,
        log: &'a IndexingLog,
        project_id: &'a str,
        policy: &'a Policy,
    ) -> Self {
        Self {
            index,
            log,
            project_id,
            policy,
        }
    }

    /// Runs one indexing pass over `repo`.
    ///
    /// With `force_full` (or when the repository has no SUCCESS
    /// watermark), every ref's tree is walked; otherwise the changesets
    /// since the watermark are folded into per-path actions. Document
    /// write failures are recorded and the run continues; the run fails
    /// only as a whole when the repository itself cannot be read.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when changeset or tree queries fail or the
    /// indexing log cannot be written. The pre-committed log row keeps
    /// its FAILED status in that case.
    pub fn index_repository(&self, repo: &dyn Repository, force_full: bool) -> Result<RunSummary> {
        let repository_id = repo.identifier().to_string();

        let Some(head) = repo.latest_changeset().map_err(EngineError::from)? else {
            debug!(repository = %repository_id, "repository has no changesets");
            return Ok(RunSummary {
                repository_id,
                status: RunStatus::Success,
                changeset: None,
                revision: None,
                added: 0,
                deleted: 0,
                failed: 0,
                message: "nothing to index".to_string(),
            });
        };

        let watermark = if force_full {
            None
        } else {
            self.log
                .latest_success(self.project_id, &repository_id)
                .map_err(EngineError::from)?
        };

        let row = self
            .log
            .begin(self.project_id, &repository_id, head.id, &head.revision)
            .map_err(EngineError::from)?;

        let mut run = IndexingRun::default();
        let outcome = match watermark {
            None => {
                info!(
                    project = self.project_id,
                    repository = %repository_id,
                    head = %head.id,
                    "full indexing run"
                );
                self.run_full(repo, &mut run).map(|()| false)
            }
            Some(entry) => {
                info!(
                    project = self.project_id,
                    repository = %repository_id,
                    since = %entry.changeset_id,
                    head = %head.id,
                    "incremental indexing run"
                );
                self.run_diff(repo, entry.changeset_id, head.id, &mut run)
            }
        };

        match outcome {
            Err(e) => {
                self.log
                    .finalize(row, RunStatus::Failed, &e.to_string())
                    .map_err(EngineError::from)?;
                Err(e)
            }
            Ok(noop) => {
                let (status, message) = if noop {
                    (RunStatus::Success, format!("already indexed: {}", head.id))
                } else if run.failures.is_empty() {
                    (
                        RunStatus::Success,
                        format!("added {}, deleted {}", run.added, run.deleted),
                    )
                } else {
                    (
                        RunStatus::Failed,
                        format!(
                            "added {}, deleted {}, failed {} ({})",
                            run.added,
                            run.deleted,
                            run.failures.len(),
                            run.failures[0]
                        ),
                    )
                };
                self.log
                    .finalize(row, status, &message)
                    .map_err(EngineError::from)?;
                info!(
                    project = self.project_id,
                    repository = %repository_id,
                    %status,
                    added = run.added,
                    deleted = run.deleted,
                    failed = run.failures.len(),
                    "indexing run finished"
                );
                Ok(RunSummary {
                    repository_id,
                    status,
                    changeset: Some(head.id),
                    revision: Some(head.revision),
                    added: run.added,
                    deleted: run.deleted,
                    failed: run.failures.len() as u64,
                    message,
                })
            }
        }
    }

    /// Walks every ref's full tree.
    fn run_full(&self, repo: &dyn Repository, run: &mut IndexingRun) -> Result<()> {
        for rev in walker::refs(repo, self.policy.walk_tags).map_err(EngineError::from)? {
            for path in TreeWalk::new(repo, rev.as_deref()) {
                let path = path.map_err(EngineError::from)?;
                if !self.extension_allowed(&path) {
                    continue;
                }
                self.add_or_update(repo, rev.as_deref(), &path, run);
            }
        }
        Ok(())
    }

    /// Applies the folded per-path actions once per ref. Returns true when
    /// the watermark was already at the head.
    fn run_diff(
        &self,
        repo: &dyn Repository,
        since: ChangesetId,
        head: ChangesetId,
        run: &mut IndexingRun,
    ) -> Result<bool> {
        let actions = match changes::detect(repo, since, head).map_err(EngineError::from)? {
            DiffOutcome::AlreadyIndexed => return Ok(true),
            DiffOutcome::Changes(actions) => actions,
        };

        for rev in walker::refs(repo, self.policy.walk_tags).map_err(EngineError::from)? {
            for (path, action) in &actions {
                if !self.extension_allowed(path) {
                    continue;
                }
                // Cat at this ref decides, whatever the folded action
                // says: a delete committed on one branch may not hold on
                // another, so content present here means add-or-update
                // and absent means the document is dropped.
                match action {
                    ActionKind::Delete | ActionKind::AddOrUpdate => {
                        self.add_or_update(repo, rev.as_deref(), path, run);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Replaces (or removes) the document for one path at one ref.
    fn add_or_update(
        &self,
        repo: &dyn Repository,
        rev: Option<&str>,
        path: &str,
        run: &mut IndexingRun,
    ) {
        let uri = document_uri(self.project_id, repo.identifier(), rev, path);

        let content = match repo.cat_file(path, rev) {
            Ok(content) => content,
            Err(e) => {
                run.record_failure(&uri, &e.to_string());
                return;
            }
        };

        let body = match content {
            None => {
                // Path absent at this ref
                self.delete_by_uri(&uri, run);
                return;
            }
            Some(bytes) if bytes.len() as u64 > self.policy.max_file_size => {
                debug!(uri, size = bytes.len(), "file over size ceiling, not indexed");
                self.delete_by_uri(&uri, run);
                return;
            }
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(body) => body,
                Err(_) => {
                    // Binary content is unsearchable; drop any stale document
                    debug!(uri, "binary file, not indexed");
                    self.delete_by_uri(&uri, run);
                    return;
                }
            },
        };

        let doc = Document {
            uri: uri.clone(),
            title: path.to_string(),
            repository_id: repo.identifier().to_string(),
            revision: rev.map(str::to_string),
            content_type: content_type_of(path),
            body,
        };

        // Replace by delete-then-add so the URI stays unique
        let replaced = match self.index.uri_to_id(&uri) {
            Ok(Some(existing)) => match self.index.delete_document(existing) {
                Ok(()) => true,
                Err(e) => {
                    run.record_failure(&uri, &e.to_string());
                    return;
                }
            },
            Ok(None) => false,
            Err(e) => {
                run.record_failure(&uri, &e.to_string());
                return;
            }
        };

        match self.index.put_document(&doc) {
            Ok(_) => {
                run.added += 1;
                if replaced {
                    run.deleted += 1;
                }
            }
            Err(e) => run.record_failure(&uri, &e.to_string()),
        }
    }

    fn delete_by_uri(&self, uri: &str, run: &mut IndexingRun) {
        match self.index.uri_to_id(uri) {
            Ok(Some(id)) => match self.index.delete_document(id) {
                Ok(()) => run.deleted += 1,
                Err(e) => run.record_failure(uri, &e.to_string()),
            },
            Ok(None) => {}
            Err(e) => run.record_failure(uri, &e.to_string()),
        }
    }

    fn extension_allowed(&self, path: &str) -> bool {
        if self.policy.extensions.is_empty() {
            return true;
        }
        std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.policy
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
    }
}

// One lock per project id: concurrent reindex requests for the same
// project serialize instead of interleaving writes.
fn project_lock(project_id: &str) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();
    let locks = LOCKS.get_or_init(Mutex::default);
    let mut map = locks.lock().unwrap_or_else(PoisonError::into_inner);
    map.entry(project_id.to_string()).or_default().clone()
}

/// Reindexes every supported repository of a project.
///
/// With `init`, the project's index is destroyed and prior log rows are
/// marked REMOVED before the rebuild. Repository failures are isolated:
/// one failing repository leaves a FAILED run in the summary and the
/// batch continues.
///
/// # Errors
///
/// Returns `EngineError::ProjectNotFound` for an unknown project id,
/// `EngineError::NoSupportedRepository` when no repository supports
/// content retrieval, and `EngineError::Store` when the index or log
/// cannot be opened.
pub fn reindex_project(
    config: &Config,
    index_root: &Path,
    project_id: &str,
    init: bool,
) -> Result<ProjectSummary> {
    let project = config
        .project(project_id)
        .ok_or_else(|| EngineError::ProjectNotFound {
            id: project_id.to_string(),
        })?;

    let repos: Vec<Box<dyn Repository>> = project.repositories.iter().map(scm::from_config).collect();
    reindex_repositories(&config.policy, index_root, project_id, &repos, init)
}

/// Reindexes an explicit set of repositories into one project index.
///
/// `reindex_project` resolves adapters from configuration and delegates
/// here; callers with their own adapters (tests, embedders) use this
/// directly.
///
/// # Errors
///
/// Same as [`reindex_project`], minus the project lookup.
pub fn reindex_repositories(
    policy: &Policy,
    index_root: &Path,
    project_id: &str,
    repos: &[Box<dyn Repository>],
    init: bool,
) -> Result<ProjectSummary> {
    let lock = project_lock(project_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    let repos = supported_repositories(project_id, repos)?;
    let log = IndexingLog::open(index_root)?;

    if init {
        FtsIndex::remove(index_root, project_id)?;
        for repo in &repos {
            let removed = log.mark_removed(project_id, repo.identifier())?;
            if removed > 0 {
                info!(
                    project = project_id,
                    repository = repo.identifier(),
                    removed,
                    "marked prior log entries removed"
                );
            }
        }
    }

    let index = FtsIndex::open(index_root, project_id, OpenMode::ReadWrite)?;
    let indexer = Indexer::new(&index, &log, project_id, policy);

    let mut runs = Vec::with_capacity(repos.len());
    for repo in &repos {
        // init already wiped the index, so every repository walks full
        match indexer.index_repository(*repo, init) {
            Ok(summary) => runs.push(summary),
            Err(e) => {
                warn!(
                    project = project_id,
                    repository = repo.identifier(),
                    error = %e,
                    "repository indexing failed"
                );
                runs.push(RunSummary {
                    repository_id: repo.identifier().to_string(),
                    status: RunStatus::Failed,
                    changeset: None,
                    revision: None,
                    added: 0,
                    deleted: 0,
                    failed: 0,
                    message: e.to_string(),
                });
            }
        }
    }

    if let Err(e) = index.optimize() {
        warn!(project = project_id, error = %e, "index optimize failed");
    }
    if let Err(e) = index.close() {
        // A close failure must not displace the run outcomes above
        warn!(project = project_id, error = %e, "index close failed");
    }

    Ok(ProjectSummary {
        project_id: project_id.to_string(),
        runs,
    })
}

/// Removes a project's index and marks its log entries REMOVED.
///
/// # Errors
///
/// Returns `EngineError::ProjectNotFound` for an unknown project id and
/// `EngineError::Store` when the index or log cannot be touched.
pub fn remove_project(config: &Config, index_root: &Path, project_id: &str) -> Result<u64> {
    let project = config
        .project(project_id)
        .ok_or_else(|| EngineError::ProjectNotFound {
            id: project_id.to_string(),
        })?;

    let lock = project_lock(project_id);
    let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

    FtsIndex::remove(index_root, project_id)?;
    let log = IndexingLog::open(index_root)?;
    let mut removed = 0;
    for repo in &project.repositories {
        removed += log.mark_removed(project_id, &repo.id)?;
    }
    Ok(removed)
}

fn supported_repositories<'a>(
    project_id: &str,
    repos: &'a [Box<dyn Repository>],
) -> Result<Vec<&'a dyn Repository>> {
    let mut supported = Vec::new();
    for repo in repos {
        if repo.supports_cat() {
            supported.push(repo.as_ref());
        } else {
            warn!(
                project = project_id,
                repository = repo.identifier(),
                "repository does not support content retrieval, skipping"
            );
        }
    }
    if supported.is_empty() {
        return Err(EngineError::NoSupportedRepository {
            id: project_id.to_string(),
        });
    }
    Ok(supported)
}
