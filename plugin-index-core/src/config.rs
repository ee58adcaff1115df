//! Run configuration
//!
//! Everything a run needs is passed explicitly: the repository list loaded
//! from `repositories.json`, the [`BuilderOptions`] assembled from CLI flags
//! and the [`Credentials`] read once from the environment.
//!
//! ## Repository list format
//!
//! ```json
//! [
//!   { "name": "MyPlugin", "repoUrl": "https://github.com/Acme/MyPlugin" }
//! ]
//! ```
//!
//! A wrapping object `{ "repositories": [...] }` is accepted as well.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Manifest file searched for inside extracted release archives
pub const DEFAULT_MANIFEST_FILE: &str = "manifest.json";

/// Base URL of the published plugin index
pub const DEFAULT_INDEX_URL: &str = "https://chorizite.github.io/Plugins/plugins";

/// Owner of the NuGet feed packages are mirrored into
pub const DEFAULT_REGISTRY_OWNER: &str = "Chorizite";

/// Default number of simultaneous tasks per fan-out level
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Environment variable holding the registry user name
pub const USER_ENV: &str = "GITHUB_USER";

/// Environment variable holding the GitHub token
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const GITHUB_PREFIXES: &[&str] = &[
    "https://github.com/",
    "http://github.com/",
    "https://www.github.com/",
];

/// A configured plugin repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Plugin (and package) name
    pub name: String,

    /// GitHub repository URL
    #[serde(alias = "repo_url", alias = "url")]
    pub repo_url: String,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, repo_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.into(),
        }
    }

    /// Parse the owner/repo pair out of the repository URL
    pub fn slug(&self) -> Result<RepoSlug> {
        RepoSlug::parse(&self.repo_url)
    }
}

/// Owner and repository name of a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoSlug {
    pub owner: String,
    pub repo: String,
}

impl RepoSlug {
    /// Parse `https://github.com/<owner>/<repo>` (trailing `/` and `.git` allowed)
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let path = GITHUB_PREFIXES
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix))
            .ok_or_else(|| IndexError::InvalidRepositoryUrl(url.to_string()))?;

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);

        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(IndexError::InvalidRepositoryUrl(url.to_string())),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepositoryListDocument {
    List(Vec<RepositoryConfig>),
    Wrapped { repositories: Vec<RepositoryConfig> },
}

/// Parse a repository list from JSON text
pub fn parse_repositories(content: &str) -> serde_json::Result<Vec<RepositoryConfig>> {
    let document: RepositoryListDocument = serde_json::from_str(content)?;
    Ok(match document {
        RepositoryListDocument::List(list) => list,
        RepositoryListDocument::Wrapped { repositories } => repositories,
    })
}

/// Load the repository list from a file
pub fn load_repositories(path: &Path) -> Result<Vec<RepositoryConfig>> {
    let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
    parse_repositories(&content).map_err(|source| IndexError::RepositoryList {
        path: path.to_path_buf(),
        source,
    })
}

/// Registry credentials (basic auth user + token)
#[derive(Clone, Default)]
pub struct Credentials {
    pub user: String,
    pub token: Option<String>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user: user.into(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Read credentials from `GITHUB_USER` / `GITHUB_TOKEN`
    ///
    /// `default_user` is used when `GITHUB_USER` is unset.
    pub fn from_env(default_user: &str) -> Self {
        let user = std::env::var(USER_ENV)
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_user.to_string());
        Self::new(user, std::env::var(TOKEN_ENV).ok())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// User/password pair for HTTP basic auth, if a token is available
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        self.token.as_deref().map(|token| (self.user.as_str(), token))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Options shared by every reconciler in a run
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Scratch directory for downloads and extraction
    pub work_dir: PathBuf,

    /// Directory the regenerated index is written to
    pub output_dir: PathBuf,

    /// Maximum simultaneous tasks at each fan-out level
    pub concurrency: usize,

    /// Base URL of the published index (`<url>/<name>.json`)
    pub index_url: String,

    /// Manifest file name searched for in release archives
    pub manifest_file: String,

    /// Push missing versions to the package registry
    pub mirror: bool,

    /// Log per-download detail at info level
    pub verbose: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            output_dir: PathBuf::from("out"),
            concurrency: DEFAULT_CONCURRENCY,
            index_url: DEFAULT_INDEX_URL.to_string(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            mirror: true,
            verbose: false,
        }
    }
}

impl BuilderOptions {
    /// Per-repository working directory (`<work_dir>/<owner>/<repo>`)
    pub fn repository_work_dir(&self, slug: &RepoSlug) -> PathBuf {
        self.work_dir.join(&slug.owner).join(&slug.repo)
    }

    /// Concurrency limit, never zero
    pub fn fan_out(&self) -> usize {
        self.concurrency.max(1)
    }
}
