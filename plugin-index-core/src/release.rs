//! Release records
//!
//! A [`ReleaseRecord`] is the normalized description of one discovered
//! release: GitHub metadata combined with the manifest bundled inside its
//! packaged zip. Records are immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::manifest::PluginManifest;
use crate::source::{Release, ReleaseAsset};

/// One release as it appears in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    /// Git tag of the release
    pub tag: String,

    /// Release display name
    pub name: String,

    /// Published as a prerelease
    pub is_beta: bool,

    /// Version declared by the manifest
    pub version: String,

    /// Plugin name declared by the manifest
    pub manifest_name: String,

    pub description: String,

    pub author: String,

    /// Release notes (release body)
    pub changelog: String,

    /// Download URL of the packaged zip asset
    pub download_url: String,

    /// Publish date (creation date for unpublished releases)
    pub date: DateTime<Utc>,
}

impl ReleaseRecord {
    /// Build a record from a release, its selected asset and the extracted manifest
    ///
    /// Fails if the manifest cannot be read or parsed; no partial record is produced.
    pub fn build(release: &Release, asset: &ReleaseAsset, manifest_path: &Path) -> Result<Self> {
        let manifest = PluginManifest::from_file(manifest_path)?;
        Ok(Self::from_manifest(release, asset, manifest))
    }

    pub fn from_manifest(release: &Release, asset: &ReleaseAsset, manifest: PluginManifest) -> Self {
        Self {
            tag: release.tag_name.clone(),
            name: release.display_name().to_string(),
            is_beta: release.prerelease,
            version: manifest.version,
            manifest_name: manifest.name,
            description: manifest.description,
            author: manifest.author,
            changelog: release.body.clone().unwrap_or_default(),
            download_url: asset.browser_download_url.clone(),
            date: release.publish_date(),
        }
    }
}

/// Sort newest first. The sort is stable, so equal dates keep discovery order.
pub fn sort_newest_first(records: &mut [ReleaseRecord]) {
    records.sort_by(|a, b| b.date.cmp(&a.date));
}
