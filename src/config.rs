//! TOML configuration: index root, project registry and indexing policy.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory for index databases. Defaults to the platform data dir.
    pub index_root: Option<PathBuf>,
    /// Results per search page.
    pub per_page: Option<usize>,
    pub policy: Policy,
    pub projects: Vec<ProjectConfig>,
}

/// Indexing policy knobs.
///
/// Tag walking and extension gating are deployment choices, not constants:
/// some sites want tag snapshots searchable, some want only source files
/// indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Walk tag refs during a full rebuild, in addition to branches.
    pub walk_tags: bool,
    /// File extensions to index; empty means every readable file.
    pub extensions: Vec<String>,
    /// Files larger than this are not indexed (their documents are removed).
    pub max_file_size: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            walk_tags: true,
            extensions: Vec::new(),
            max_file_size: 1024 * 1024, // 1MB
        }
    }
}

/// One indexable project and its repositories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub id: String,
    /// Visible to everyone; searched under the `all` scope.
    pub public: bool,
    /// The operator is a member; searched under the `my-projects` scope.
    pub member: bool,
    /// Parent project id for the `subprojects` scope.
    pub parent: Option<String>,
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            public: false,
            member: false,
            parent: None,
            repositories: Vec::new(),
        }
    }
}

/// One repository within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    #[serde(default)]
    pub kind: RepoKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    #[default]
    Git,
}

/// Project selection scope for search requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Scope {
    /// Every accessible project.
    All,
    /// Projects the operator is a member of.
    MyProjects,
    /// The target project and its accessible descendants.
    Subprojects,
    /// The target project only.
    #[default]
    Single,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {e}", path.display())))?;
        for project in &config.projects {
            if project.id.is_empty() {
                return Err(EngineError::Config("project with empty id".into()));
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn per_page(&self) -> usize {
        self.per_page.unwrap_or(25)
    }

    /// Looks up a project by identifier.
    #[must_use]
    pub fn project(&self, id: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Resolves the set of projects a search request targets.
    ///
    /// A project is accessible when it is public or the operator is a
    /// member. Scopes that name a target fall back to all accessible
    /// projects when no target is given.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ProjectNotFound` when a named target does not
    /// exist.
    pub fn select_projects(&self, scope: Scope, id: Option<&str>) -> Result<Vec<&ProjectConfig>> {
        let target = match id {
            Some(id) => Some(
                self.project(id)
                    .ok_or_else(|| EngineError::ProjectNotFound { id: id.to_string() })?,
            ),
            None => None,
        };

        let selected: Vec<&ProjectConfig> = match (scope, target) {
            (Scope::All, _) => self.projects.iter().filter(|p| p.accessible()).collect(),
            (Scope::MyProjects, _) => self.projects.iter().filter(|p| p.member).collect(),
            (Scope::Subprojects, Some(target)) => {
                let mut out = vec![target];
                out.extend(
                    self.projects
                        .iter()
                        .filter(|p| p.accessible() && self.descends_from(p, &target.id)),
                );
                out
            }
            (Scope::Single, Some(target)) => vec![target],
            // No target named: fall back to everything accessible.
            (Scope::Subprojects | Scope::Single, None) => {
                self.projects.iter().filter(|p| p.accessible()).collect()
            }
        };
        Ok(selected)
    }

    fn descends_from(&self, project: &ProjectConfig, ancestor: &str) -> bool {
        let mut current = project.parent.as_deref();
        // Parent links form a tree; bound the walk in case config cycles.
        for _ in 0..self.projects.len() {
            match current {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = self.project(parent).and_then(|p| p.parent.as_deref()),
                None => return false,
            }
        }
        false
    }
}

impl ProjectConfig {
    #[must_use]
    pub fn accessible(&self) -> bool {
        self.public || self.member
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        toml::from_str(
            r#"
            per_page = 10

            [policy]
            walk_tags = false
            extensions = ["rs", "md"]

            [[projects]]
            id = "core"
            public = true
              [[projects.repositories]]
              id = "main"
              path = "/srv/git/core.git"

            [[projects]]
            id = "tools"
            member = true
            parent = "core"

            [[projects]]
            id = "secret"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_config() {
        let config = sample();
        assert_eq!(config.per_page(), 10);
        assert!(!config.policy.walk_tags);
        assert_eq!(config.policy.extensions, ["rs", "md"]);
        assert_eq!(config.projects.len(), 3);
        assert_eq!(config.project("core").unwrap().repositories.len(), 1);
    }

    #[test]
    fn test_scope_all_excludes_inaccessible() {
        let config = sample();
        let ids: Vec<_> = config
            .select_projects(Scope::All, None)
            .unwrap()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["core", "tools"]);
    }

    #[test]
    fn test_scope_my_projects() {
        let config = sample();
        let ids: Vec<_> = config
            .select_projects(Scope::MyProjects, None)
            .unwrap()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["tools"]);
    }

    #[test]
    fn test_scope_subprojects() {
        let config = sample();
        let ids: Vec<_> = config
            .select_projects(Scope::Subprojects, Some("core"))
            .unwrap()
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, ["core", "tools"]);
    }

    #[test]
    fn test_scope_single_unknown_project() {
        let config = sample();
        let err = config
            .select_projects(Scope::Single, Some("ghost"))
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn test_default_policy() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.policy.walk_tags);
        assert!(config.policy.extensions.is_empty());
        assert_eq!(config.policy.max_file_size, 1024 * 1024);
        assert_eq!(config.per_page(), 25);
    }
}
