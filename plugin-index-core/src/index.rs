//! Index entries
//!
//! A [`RepositoryIndexEntry`] is derived from the release records of one
//! repository and written to `<out>/plugins/<name>.json`. After a run the
//! driver writes `<out>/index.json`, a summary of every entry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::RepositoryConfig;
use crate::error::{IndexError, Result};
use crate::release::{sort_newest_first, ReleaseRecord};

/// Subdirectory of the output directory holding per-plugin entries
pub const PLUGINS_DIR: &str = "plugins";

/// Summary index file name
pub const SUMMARY_FILE: &str = "index.json";

/// Index entry for one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndexEntry {
    pub name: String,
    pub description: String,
    pub author: String,
    pub repo_url: String,

    /// Newest non-prerelease record
    pub latest: Option<ReleaseRecord>,

    /// Newest prerelease record
    pub latest_beta: Option<ReleaseRecord>,

    /// Every record, newest first
    pub releases: Vec<ReleaseRecord>,
}

impl RepositoryIndexEntry {
    /// Derive the entry from a repository's records
    ///
    /// `latest` and `latest_beta` are picked independently; either may be
    /// absent. Description and author come from `latest`.
    pub fn from_records(config: &RepositoryConfig, mut records: Vec<ReleaseRecord>) -> Self {
        sort_newest_first(&mut records);

        let latest = records.iter().find(|r| !r.is_beta).cloned();
        let latest_beta = records.iter().find(|r| r.is_beta).cloned();

        let (description, author) = latest
            .as_ref()
            .map(|r| (r.description.clone(), r.author.clone()))
            .unwrap_or_default();

        Self {
            name: config.name.clone(),
            description,
            author,
            repo_url: config.repo_url.clone(),
            latest,
            latest_beta,
            releases: records,
        }
    }

    /// Path of this entry below `output_dir`
    pub fn path_in(&self, output_dir: &Path) -> PathBuf {
        output_dir
            .join(PLUGINS_DIR)
            .join(format!("{}.json", file_stem(&self.name)))
    }

    /// Write the entry as pretty JSON, returning the file path
    pub async fn write_to(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = self.path_in(output_dir);
        write_json(&path, self).await?;
        Ok(path)
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            name: self.name.clone(),
            repo_url: self.repo_url.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            latest_version: self.latest.as_ref().map(|r| r.version.clone()),
            latest_beta_version: self.latest_beta.as_ref().map(|r| r.version.clone()),
        }
    }
}

/// One line of the summary index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub name: String,
    pub repo_url: String,
    pub description: String,
    pub author: String,
    pub latest_version: Option<String>,
    pub latest_beta_version: Option<String>,
}

/// Write `<output_dir>/index.json`, sorted by name
pub async fn write_summary_index(
    output_dir: &Path,
    mut summaries: Vec<IndexSummary>,
) -> Result<PathBuf> {
    summaries.sort_by(|a, b| a.name.cmp(&b.name));
    let path = output_dir.join(SUMMARY_FILE);
    write_json(&path, &summaries).await?;
    Ok(path)
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| IndexError::io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| IndexError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    tokio::fs::write(path, content)
        .await
        .map_err(|e| IndexError::io(path, e))
}

/// Keep file names inside the target directory
pub(crate) fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}
