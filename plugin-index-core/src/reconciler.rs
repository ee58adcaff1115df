//! Per-repository reconciliation
//!
//! For one configured repository:
//! 1. list releases
//! 2. download + extract each release's packaged zip and read its manifest
//! 3. derive the index entry (latest / latest beta)
//! 4. snapshot the currently published entry
//! 5. write the regenerated entry
//! 6. mirror missing versions into the package registry
//!
//! Releases are processed concurrently. A failing release is logged and
//! dropped; it never aborts the repository.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use crate::archive::extract_zip_blocking;
use crate::config::{BuilderOptions, Credentials, RepoSlug, RepositoryConfig};
use crate::driver::Services;
use crate::error::{IndexError, Result};
use crate::index::{file_stem, RepositoryIndexEntry};
use crate::manifest::find_manifest;
use crate::mirror::{MirrorPublisher, MirrorReport};
use crate::release::ReleaseRecord;
use crate::source::{Release, ReleaseAsset};

/// What one repository run produced
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub entry: RepositoryIndexEntry,
    /// Releases dropped (no asset, no manifest, download or parse failure)
    pub releases_skipped: usize,
    /// `None` when mirroring was disabled or could not start
    pub mirror: Option<MirrorReport>,
}

/// Reconciles a single repository
pub struct RepositoryReconciler {
    config: RepositoryConfig,
    slug: RepoSlug,
    options: Arc<BuilderOptions>,
    services: Services,
    credentials: Credentials,
}

impl RepositoryReconciler {
    /// Fails if the repository URL cannot be parsed
    pub fn new(
        config: RepositoryConfig,
        options: Arc<BuilderOptions>,
        services: Services,
        credentials: Credentials,
    ) -> Result<Self> {
        let slug = config.slug()?;
        Ok(Self {
            config,
            slug,
            options,
            services,
            credentials,
        })
    }

    /// `<work_dir>/<owner>/<repo>`
    pub fn work_dir(&self) -> PathBuf {
        self.options.repository_work_dir(&self.slug)
    }

    /// Run the full pipeline for this repository
    pub async fn build(&self) -> Result<ReconcileOutcome> {
        let work_dir = self.work_dir();
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| IndexError::io(&work_dir, e))?;

        let releases = self.services.source.list_releases(&self.slug).await?;
        info!(
            "{}: found {} releases on {}",
            self.slug,
            releases.len(),
            self.services.source.name()
        );

        let records = self.collect_records(&releases).await;
        let releases_skipped = releases.len() - records.len();

        let entry = RepositoryIndexEntry::from_records(&self.config, records);

        if let Some(latest) = &entry.latest {
            self.fetch_published_entry(latest).await;
        }

        match entry.write_to(&self.options.output_dir).await {
            Ok(path) => debug!("{}: wrote {}", self.slug, path.display()),
            Err(e) => error!("{}: error writing index entry: {}", self.slug, e),
        }

        let mirror = self.mirror(&entry).await;

        Ok(ReconcileOutcome {
            entry,
            releases_skipped,
            mirror,
        })
    }

    /// Settled fan-out over releases; failures are logged and dropped
    async fn collect_records(&self, releases: &[Release]) -> Vec<ReleaseRecord> {
        let stems = work_stems(releases);
        let results: Vec<Result<ReleaseRecord>> = stream::iter(releases.iter().zip(stems))
            .map(|(release, stem)| {
                let span = tracing::info_span!("release", tag = %release.tag_name);
                self.process_release(release, stem).instrument(span)
            })
            .buffer_unordered(self.options.fan_out())
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|result| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    error!("{}: {}", self.slug, e);
                    None
                }
            })
            .collect()
    }

    async fn process_release(&self, release: &Release, stem: String) -> Result<ReleaseRecord> {
        let asset = release
            .select_asset()
            .ok_or_else(|| IndexError::NoReleaseAsset {
                tag: release.tag_name.clone(),
                assets: release.asset_names(),
            })?;

        let extract_dir = self.download_and_extract(release, asset, &stem).await?;

        let manifest_file = self.options.manifest_file.clone();
        let (release_owned, asset_owned) = (release.clone(), asset.clone());
        let record = tokio::task::spawn_blocking(move || {
            let manifest_path = find_manifest(&extract_dir, &manifest_file)?.ok_or_else(|| {
                IndexError::ManifestNotFound {
                    tag: release_owned.tag_name.clone(),
                    file: manifest_file.clone(),
                }
            })?;
            ReleaseRecord::build(&release_owned, &asset_owned, &manifest_path)
        })
        .await??;
        debug!(
            "{}@{}: {} {} (beta: {})",
            self.slug, release.tag_name, record.manifest_name, record.version, record.is_beta
        );
        Ok(record)
    }

    /// Download `<stem>.zip` and extract it into `<stem>/`, replacing stale copies
    async fn download_and_extract(
        &self,
        release: &Release,
        asset: &ReleaseAsset,
        stem: &str,
    ) -> Result<PathBuf> {
        let work_dir = self.work_dir();
        let zip_path = work_dir.join(format!("{stem}.zip"));
        let extract_dir = work_dir.join(stem);

        if tokio::fs::try_exists(&zip_path).await.unwrap_or(false) {
            tokio::fs::remove_file(&zip_path)
                .await
                .map_err(|e| IndexError::io(&zip_path, e))?;
        }
        if tokio::fs::try_exists(&extract_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&extract_dir)
                .await
                .map_err(|e| IndexError::io(&extract_dir, e))?;
        }

        if self.options.verbose {
            info!(
                "{}@{}: downloading {} ({} bytes): {}",
                self.slug, release.tag_name, asset.name, asset.size, asset.browser_download_url
            );
        }
        self.services
            .transfer
            .download(&asset.browser_download_url, &zip_path, None)
            .await?;

        let entries = extract_zip_blocking(&zip_path, &extract_dir).await?;
        if self.options.verbose {
            info!(
                "{}@{}: extracted {} entries from {} to {}",
                self.slug,
                release.tag_name,
                entries,
                asset.name,
                extract_dir.display()
            );
        }

        Ok(extract_dir)
    }

    /// Best-effort snapshot of the currently published entry
    async fn fetch_published_entry(&self, latest: &ReleaseRecord) {
        let url = format!(
            "{}/{}.json",
            self.options.index_url.trim_end_matches('/'),
            latest.manifest_name
        );
        let dest = self
            .work_dir()
            .join(format!("{}.json", file_stem(&latest.manifest_name)));

        match self.services.transfer.download(&url, &dest, None).await {
            Ok(()) => debug!("{}: saved published entry to {}", self.slug, dest.display()),
            Err(e) => warn!(
                "{}: error getting existing release info: {}",
                self.slug, e
            ),
        }
    }

    async fn mirror(&self, entry: &RepositoryIndexEntry) -> Option<MirrorReport> {
        if !self.options.mirror {
            return None;
        }
        if !self.credentials.has_token() {
            warn!("{}: no registry token configured, skipping mirror", self.slug);
            return None;
        }

        let publisher = MirrorPublisher::new(
            self.services.registry.clone(),
            self.services.transfer.clone(),
            self.credentials.clone(),
            self.options.fan_out(),
        );

        match publisher
            .mirror(&self.slug, &self.config.name, &self.work_dir(), &entry.releases)
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                error!("{}: error mirroring packages: {}", self.slug, e);
                None
            }
        }
    }
}

/// Work directory names for `releases`, one per release, never shared
///
/// Tags that map to the same file stem get `-2`, `-3`, ... appended in
/// listing order.
fn work_stems(releases: &[Release]) -> Vec<String> {
    let mut used = HashSet::new();
    releases
        .iter()
        .map(|release| {
            let base = file_stem(&release.tag_name);
            let mut stem = base.clone();
            let mut n = 2;
            while !used.insert(stem.clone()) {
                stem = format!("{base}-{n}");
                n += 1;
            }
            stem
        })
        .collect()
}
