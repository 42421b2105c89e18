//! Query engine: phrase construction and multi-index search.
//!
//! A search request fans out over one read handle per selected project
//! and merges the ranked hits into a single globally-paginated result
//! set. Hits stay unresolved (doc id + source ordinal) until a page is
//! materialized, so counting is cheap even across many indexes.

use crate::config::ProjectConfig;
use crate::document::Document;
use crate::error::{SearchResult, StoreError};
use crate::store::{Filters, FtsIndex, IndexingLog, OpenMode, TextIndex};
use crate::types::{DocId, Score};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// An open read handle onto one project's index.
pub struct ProjectIndex {
    pub project_id: String,
    index: FtsIndex,
}

impl ProjectIndex {
    #[must_use]
    pub fn from_parts(project_id: String, index: FtsIndex) -> Self {
        Self { project_id, index }
    }
}

/// One ranked match before document resolution.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit {
    pub score: Score,
    pub doc_id: DocId,
    /// Ordinal of the owning handle in the searched slice.
    source: usize,
}

/// A hit with its document materialized.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedHit {
    pub project_id: String,
    pub score: Score,
    pub document: Document,
}

/// Merged, globally-ordered hits across every searched index.
pub struct MergedResults<'a> {
    handles: &'a [ProjectIndex],
    hits: Vec<SearchHit>,
}

/// Builds an FTS5 MATCH expression from parsed tokens.
///
/// Every token is quoted so user input never reaches the MATCH grammar
/// as syntax; embedded quotes are doubled per the FTS5 string rules.
/// `all_words` joins with AND, otherwise OR.
#[must_use]
pub fn build_phrase(tokens: &[String], all_words: bool) -> String {
    let joiner = if all_words { " AND " } else { " OR " };
    tokens
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(joiner)
}

/// Opens read handles for the selected projects.
///
/// Projects with no SUCCESS log entry have nothing searchable and are
/// skipped, as are projects whose index file is missing; both are normal
/// states, never errors.
///
/// # Errors
///
/// Returns `SearchError::Store` when the indexing log cannot be read.
pub fn open_project_handles(
    projects: &[&ProjectConfig],
    index_root: &Path,
    log: &IndexingLog,
) -> SearchResult<Vec<ProjectIndex>> {
    let mut handles = Vec::with_capacity(projects.len());
    for project in projects {
        if !log.has_success(&project.id)? {
            debug!(project = %project.id, "never indexed, skipping");
            continue;
        }
        match FtsIndex::open(index_root, &project.id, OpenMode::Read) {
            Ok(index) => handles.push(ProjectIndex {
                project_id: project.id.clone(),
                index,
            }),
            Err(StoreError::Unavailable { path, reason }) => {
                warn!(project = %project.id, path = %path.display(), reason, "index unavailable, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(handles)
}

/// Searches every handle and merges the hits.
///
/// Order is descending score; ties break by (handle ordinal, doc id) so
/// pagination is stable. An empty token list yields an empty result set
/// without touching any backend.
///
/// # Errors
///
/// Returns `SearchError::Store` when any backend query fails.
pub fn search<'a>(
    handles: &'a [ProjectIndex],
    tokens: &[String],
    all_words: bool,
    filters: &Filters,
) -> SearchResult<MergedResults<'a>> {
    if tokens.is_empty() {
        return Ok(MergedResults {
            handles,
            hits: Vec::new(),
        });
    }

    let phrase = build_phrase(tokens, all_words);
    debug!(%phrase, indexes = handles.len(), "dispatching search");

    let mut hits = Vec::new();
    for (source, handle) in handles.iter().enumerate() {
        for (doc_id, score) in handle.index.search(&phrase, filters)? {
            hits.push(SearchHit {
                score,
                doc_id,
                source,
            });
        }
    }

    hits.sort_by(|a, b| {
        b.score
            .as_f64()
            .total_cmp(&a.score.as_f64())
            .then_with(|| (a.source, a.doc_id).cmp(&(b.source, b.doc_id)))
    });

    Ok(MergedResults { handles, hits })
}

impl MergedResults<'_> {
    /// Total matches across every searched index.
    #[must_use]
    pub fn count(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Materializes one page of the merged set.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Store` when document resolution fails.
    pub fn page(&self, offset: usize, limit: usize) -> SearchResult<Vec<ResolvedHit>> {
        let mut out = Vec::with_capacity(limit.min(self.hits.len()));
        for hit in self.hits.iter().skip(offset).take(limit) {
            let handle = &self.handles[hit.source];
            // A document deleted since the hit list was built is skipped
            if let Some(document) = handle.index.get_document(hit.doc_id)? {
                out.push(ResolvedHit {
                    project_id: handle.project_id.clone(),
                    score: hit.score,
                    document,
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(uri: &str, body: &str) -> Document {
        Document {
            uri: uri.to_string(),
            title: uri.to_string(),
            repository_id: "main".to_string(),
            revision: Some("main".to_string()),
            content_type: Some("text/plain".to_string()),
            body: body.to_string(),
        }
    }

    fn handle(project_id: &str, docs: &[(&str, &str)]) -> ProjectIndex {
        let index = FtsIndex::in_memory().unwrap();
        for (uri, body) in docs {
            index.put_document(&doc(uri, body)).unwrap();
        }
        ProjectIndex {
            project_id: project_id.to_string(),
            index,
        }
    }

    #[test]
    fn test_build_phrase() {
        let tokens = vec!["hello".to_string(), "wide world".to_string()];
        assert_eq!(build_phrase(&tokens, true), "\"hello\" AND \"wide world\"");
        assert_eq!(build_phrase(&tokens, false), "\"hello\" OR \"wide world\"");
    }

    #[test]
    fn test_build_phrase_escapes_quotes() {
        let tokens = vec!["say \"hi\"".to_string()];
        assert_eq!(build_phrase(&tokens, true), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_empty_tokens_yield_empty_results() {
        let handles = [handle("p1", &[("/e/a.txt", "hello")])];
        let results = search(&handles, &[], true, &Filters::default()).unwrap();
        assert_eq!(results.count(), 0);
        assert!(results.page(0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_merge_orders_by_score_across_indexes() {
        // More occurrences of the term rank higher under bm25
        let handles = [
            handle("p1", &[("/e/weak.txt", "needle in a long haystack of words")]),
            handle("p2", &[("/e/strong.txt", "needle needle needle")]),
        ];
        let tokens = vec!["needle".to_string()];
        let results = search(&handles, &tokens, true, &Filters::default()).unwrap();
        assert_eq!(results.count(), 2);

        let page = results.page(0, 10).unwrap();
        assert_eq!(page[0].project_id, "p2");
        assert_eq!(page[1].project_id, "p1");
        assert!(page[0].score >= page[1].score);
    }

    #[test]
    fn test_all_words_vs_any_word() {
        let handles = [handle(
            "p1",
            &[("/e/a.txt", "alpha beta"), ("/e/b.txt", "alpha only")],
        )];
        let tokens = vec!["alpha".to_string(), "beta".to_string()];

        let all = search(&handles, &tokens, true, &Filters::default()).unwrap();
        assert_eq!(all.count(), 1);

        let any = search(&handles, &tokens, false, &Filters::default()).unwrap();
        assert_eq!(any.count(), 2);
    }

    #[test]
    fn test_pagination_is_global_over_merged_set() {
        let handles = [
            handle("p1", &[("/e/a.txt", "hello a"), ("/e/b.txt", "hello b")]),
            handle("p2", &[("/e/c.txt", "hello c"), ("/e/d.txt", "hello d")]),
        ];
        let tokens = vec!["hello".to_string()];
        let results = search(&handles, &tokens, true, &Filters::default()).unwrap();
        assert_eq!(results.count(), 4);

        let first = results.page(0, 3).unwrap();
        let second = results.page(3, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 1);

        let mut seen: Vec<String> = first
            .iter()
            .chain(second.iter())
            .map(|h| h.document.uri.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_tie_break_is_stable() {
        // Identical content ranks identically; order falls back to
        // handle ordinal then doc id
        let handles = [
            handle("p1", &[("/e/a.txt", "same words")]),
            handle("p2", &[("/e/b.txt", "same words")]),
        ];
        let tokens = vec!["same".to_string()];
        let first = search(&handles, &tokens, true, &Filters::default()).unwrap();
        let second = search(&handles, &tokens, true, &Filters::default()).unwrap();
        let order = |r: &MergedResults<'_>| {
            r.page(0, 10)
                .unwrap()
                .iter()
                .map(|h| h.project_id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), ["p1", "p2"]);
        assert_eq!(order(&first), order(&second));
    }

    #[test]
    fn test_filters_pass_through() {
        let index = FtsIndex::in_memory().unwrap();
        let mut main = doc("/e/a.txt", "needle");
        main.revision = Some("main".to_string());
        index.put_document(&main).unwrap();
        let mut tagged = doc("/e/b.txt", "needle");
        tagged.revision = Some("v1.0".to_string());
        index.put_document(&tagged).unwrap();
        let handles = [ProjectIndex {
            project_id: "p1".to_string(),
            index,
        }];

        let tokens = vec!["needle".to_string()];
        let filters = Filters {
            revision: Some("v1.0".to_string()),
            ..Filters::default()
        };
        let results = search(&handles, &tokens, true, &filters).unwrap();
        assert_eq!(results.count(), 1);
        assert_eq!(results.page(0, 10).unwrap()[0].document.uri, "/e/b.txt");
    }
}
