//! reposearch: incremental full-text search over version-controlled
//! repositories.
//!
//! Usage:
//!   reposearch --config registry.toml reindex --all          # rebuild everything stale
//!   reposearch --config registry.toml reindex --id core --init
//!   reposearch --config registry.toml search "hello world" --scope all
//!   reposearch --config registry.toml stats --id core

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use reposearch::config::{Config, Scope};
use reposearch::error::EngineError;
use reposearch::services::{self, ProjectSummary};
use reposearch::store::{Filters, FtsIndex, IndexingLog, OpenMode, TextIndex};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reposearch")]
#[command(about = "Incremental full-text search over version-controlled repositories")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "reposearch.toml")]
    config: PathBuf,

    /// Index root directory (default: data dir, derived from the config path)
    #[arg(long, global = true)]
    index_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index projects: incremental by default, full with --init
    Reindex {
        /// Project to index
        #[arg(long)]
        id: Option<String>,

        /// Index every configured project (in parallel)
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Wipe the index first and rebuild from scratch
        #[arg(long)]
        init: bool,
    },

    /// Search indexed projects
    Search {
        /// Query; double quotes group phrases
        query: String,

        /// Target project (scope anchor)
        #[arg(long)]
        id: Option<String>,

        /// Which projects to search
        #[arg(long, value_enum, default_value_t = Scope::Single)]
        scope: Scope,

        /// Match documents containing any token instead of all
        #[arg(long)]
        any_word: bool,

        /// Result page, 1-based
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Only documents from this repository
        #[arg(long)]
        repository: Option<String>,

        /// Only documents at this branch or tag
        #[arg(long)]
        rev: Option<String>,

        /// Only documents with this MIME type
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Remove a project's index and mark its log entries removed
    Remove {
        #[arg(long)]
        id: String,
    },

    /// Show a project's document count and per-repository watermarks
    Stats {
        #[arg(long)]
        id: String,
    },
}

#[derive(Serialize)]
struct SearchOutput {
    total: usize,
    page: usize,
    per_page: usize,
    hits: Vec<services::ResolvedHit>,
}

#[derive(Serialize)]
struct RepositoryStats {
    repository_id: String,
    changeset: Option<i64>,
    revision: Option<String>,
    indexed_at: Option<String>,
}

#[derive(Serialize)]
struct StatsOutput {
    project_id: String,
    documents: u64,
    repositories: Vec<RepositoryStats>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Results go to stdout as JSON; logs stay on stderr
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "reposearch=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error[{}] (status {}): {e}", e.code(), e.http_status());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> reposearch::Result<bool> {
    let config = Config::load(&cli.config)?;
    let index_root = match (&cli.index_root, &config.index_root) {
        (Some(root), _) => root.clone(),
        (None, Some(root)) => root.clone(),
        (None, None) => reposearch::default_index_root(&cli.config),
    };

    match &cli.command {
        Commands::Reindex { id, all, init } => {
            if *all {
                // One bad project must not sink the batch
                let outcomes: Vec<reposearch::Result<ProjectSummary>> = config
                    .projects
                    .par_iter()
                    .map(|p| services::reindex_project(&config, &index_root, &p.id, *init))
                    .collect();

                let mut clean = true;
                let mut summaries = Vec::with_capacity(outcomes.len());
                for outcome in outcomes {
                    match outcome {
                        Ok(summary) => {
                            clean &= summary.all_succeeded();
                            summaries.push(summary);
                        }
                        Err(e) => {
                            clean = false;
                            eprintln!(
                                "error[{}] (status {}): {e}",
                                e.code(),
                                e.http_status()
                            );
                        }
                    }
                }
                println!("{}", to_json(&summaries)?);
                Ok(clean)
            } else {
                let id = id.as_deref().ok_or_else(|| {
                    EngineError::Config("reindex needs --id <project> or --all".into())
                })?;
                let summary = services::reindex_project(&config, &index_root, id, *init)?;
                println!("{}", to_json(&summary)?);
                Ok(summary.all_succeeded())
            }
        }

        Commands::Search {
            query,
            id,
            scope,
            any_word,
            page,
            repository,
            rev,
            content_type,
        } => {
            let tokens = services::tokenizer::parse(query);
            let projects = config.select_projects(*scope, id.as_deref())?;

            let log = IndexingLog::open(&index_root).map_err(EngineError::from)?;
            let handles = services::open_project_handles(&projects, &index_root, &log)
                .map_err(EngineError::from)?;

            let filters = Filters {
                repository: repository.clone(),
                revision: rev.clone(),
                content_type: content_type.clone(),
            };
            let results = services::search(&handles, &tokens, !any_word, &filters)
                .map_err(EngineError::from)?;

            let per_page = config.per_page();
            let page = (*page).max(1);
            let hits = results
                .page((page - 1) * per_page, per_page)
                .map_err(EngineError::from)?;

            let output = SearchOutput {
                total: results.count(),
                page,
                per_page,
                hits,
            };
            println!("{}", to_json(&output)?);
            Ok(true)
        }

        Commands::Remove { id } => {
            let removed = services::remove_project(&config, &index_root, id)?;
            println!("{}", to_json(&serde_json::json!({ "project_id": id, "log_entries_removed": removed }))?);
            Ok(true)
        }

        Commands::Stats { id } => {
            let project = config
                .project(id)
                .ok_or_else(|| EngineError::ProjectNotFound { id: id.clone() })?;

            let documents = match FtsIndex::open(&index_root, id, OpenMode::Read) {
                Ok(index) => {
                    let n = index.doc_num().map_err(EngineError::from)?;
                    index.close().map_err(EngineError::from)?;
                    n
                }
                Err(_) => 0,
            };

            let log = IndexingLog::open(&index_root).map_err(EngineError::from)?;
            let mut repositories = Vec::with_capacity(project.repositories.len());
            for repo in &project.repositories {
                let watermark = log
                    .latest_success(id, &repo.id)
                    .map_err(EngineError::from)?;
                repositories.push(RepositoryStats {
                    repository_id: repo.id.clone(),
                    changeset: watermark.as_ref().map(|w| w.changeset_id.as_i64()),
                    revision: watermark.as_ref().map(|w| w.revision.clone()),
                    indexed_at: watermark.map(|w| w.created_at),
                });
            }

            let output = StatsOutput {
                project_id: id.clone(),
                documents,
                repositories,
            };
            println!("{}", to_json(&output)?);
            Ok(true)
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> reposearch::Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Config(format!("cannot serialize output: {e}")))
}
