//! The canonical representation of one indexed unit: a file at a revision.

use serde::{Deserialize, Serialize};

/// An immutable indexed document.
///
/// Addressed by a URI deterministically derived from project, repository,
/// revision and path, so re-indexing the same path+revision replaces the
/// existing document instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique key within an index.
    pub uri: String,
    /// Display path.
    pub title: String,
    pub repository_id: String,
    /// Branch, tag or changeset identifier; `None` for ref-less repositories.
    pub revision: Option<String>,
    /// MIME type guessed from the file extension.
    pub content_type: Option<String>,
    /// File content; may be empty.
    pub body: String,
}

/// Builds the stable document URI for a repository entry.
///
/// Mirrors the repository-entry route shape:
/// `/projects/<project>/repository/<repo>/revisions/<rev>/entry/<path>`,
/// with the revision segment omitted for ref-less repositories.
#[must_use]
pub fn document_uri(
    project_id: &str,
    repository_id: &str,
    revision: Option<&str>,
    path: &str,
) -> String {
    let path = path.trim_start_matches('/');
    match revision {
        Some(rev) => {
            format!("/projects/{project_id}/repository/{repository_id}/revisions/{rev}/entry/{path}")
        }
        None => format!("/projects/{project_id}/repository/{repository_id}/entry/{path}"),
    }
}

/// Guesses a MIME type from the file extension.
///
/// Covers the types the search UI distinguishes; everything else is
/// indexed without a content type (filters on it simply never match).
#[must_use]
pub fn content_type_of(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    if ext == path {
        return None;
    }
    let mime = match ext.to_ascii_lowercase().as_str() {
        "txt" | "text" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "json" => "application/json",
        "yaml" | "yml" => "application/x-yaml",
        "toml" => "application/toml",
        "js" => "application/javascript",
        "rs" => "text/x-rust",
        "c" | "h" => "text/x-c",
        "cpp" | "cc" | "hpp" => "text/x-c++",
        "py" => "text/x-python",
        "rb" => "text/x-ruby",
        "java" => "text/x-java",
        "go" => "text/x-go",
        "sh" | "bash" => "application/x-sh",
        "sql" => "application/sql",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_with_revision() {
        let uri = document_uri("proj", "main", Some("develop"), "src/lib.rs");
        assert_eq!(
            uri,
            "/projects/proj/repository/main/revisions/develop/entry/src/lib.rs"
        );
    }

    #[test]
    fn test_uri_without_revision() {
        let uri = document_uri("proj", "main", None, "/README.md");
        assert_eq!(uri, "/projects/proj/repository/main/entry/README.md");
    }

    #[test]
    fn test_uri_is_deterministic() {
        let a = document_uri("p", "r", Some("v1"), "a/b.txt");
        let b = document_uri("p", "r", Some("v1"), "a/b.txt");
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_of("src/lib.rs").as_deref(), Some("text/x-rust"));
        assert_eq!(content_type_of("README.md").as_deref(), Some("text/markdown"));
        assert_eq!(content_type_of("data.bin"), None);
        assert_eq!(content_type_of("Makefile"), None);
    }
}
