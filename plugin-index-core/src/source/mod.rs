//! Release sources
//!
//! A [`ReleaseSource`] lists the published releases of a repository.
//! [`GitHubReleaseSource`] talks to the GitHub REST API; tests plug in
//! in-memory sources.

mod github;

pub use github::GitHubReleaseSource;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RepoSlug;
use crate::error::Result;

/// Assets whose name contains this are GitHub's auto-generated source archives
const SOURCE_ARCHIVE_MARKER: &str = "Source code";

/// A published release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub prerelease: bool,

    #[serde(default)]
    pub body: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,

    #[serde(default)]
    pub size: u64,
}

impl Release {
    /// Display name, falling back to the tag when the release is unnamed
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.tag_name,
        }
    }

    /// Published timestamp, or creation timestamp for unpublished releases
    pub fn publish_date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }

    /// First packaged `.zip` asset, skipping source-code archives
    pub fn select_asset(&self) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|a| !a.name.contains(SOURCE_ARCHIVE_MARKER) && a.name.ends_with(".zip"))
    }

    /// Comma-separated asset names for log messages
    pub fn asset_names(&self) -> String {
        self.assets
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lists releases for a repository
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// All releases of the repository, in the order the host returns them
    async fn list_releases(&self, slug: &RepoSlug) -> Result<Vec<Release>>;

    /// Source identifier for logging
    fn name(&self) -> &'static str;
}
