//! Engine services: query parsing, change detection, tree walking,
//! indexing runs and multi-index search.

pub mod changes;
pub mod indexer;
pub mod query;
pub mod tokenizer;
pub mod walker;

pub use changes::{detect, DiffOutcome};
pub use indexer::{
    reindex_project, reindex_repositories, remove_project, Indexer, ProjectSummary, RunSummary,
};
pub use query::{
    build_phrase, open_project_handles, search, MergedResults, ProjectIndex, ResolvedHit,
    SearchHit,
};
pub use walker::{refs, TreeWalk};
