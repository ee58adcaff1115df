//! Package mirroring
//!
//! Pushes every discovered release version the registry does not already
//! hold. Versions are handled concurrently; a failure on one version is
//! logged and does not affect the others.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{Credentials, RepoSlug};
use crate::error::Result;
use crate::index::file_stem;
use crate::registry::{normalize_version, PackageRegistry, PushOutcome};
use crate::release::ReleaseRecord;
use crate::transfer::FileTransfer;

/// Per-version results of a mirror run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    /// Versions the registry already listed
    pub already_present: usize,
    /// Versions pushed and accepted
    pub pushed: usize,
    /// Versions pushed but reported as duplicates by the registry
    pub duplicates: usize,
    /// Versions whose download or push failed
    pub failed: usize,
}

impl MirrorReport {
    /// Number of push attempts made
    pub fn attempts(&self) -> usize {
        self.pushed + self.duplicates + self.failed
    }

    fn record(&mut self, outcome: VersionOutcome) {
        match outcome {
            VersionOutcome::AlreadyPresent => self.already_present += 1,
            VersionOutcome::Pushed => self.pushed += 1,
            VersionOutcome::Duplicate => self.duplicates += 1,
            VersionOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionOutcome {
    AlreadyPresent,
    Pushed,
    Duplicate,
    Failed,
}

/// Mirrors release packages into a [`PackageRegistry`]
#[derive(Clone)]
pub struct MirrorPublisher {
    registry: Arc<dyn PackageRegistry>,
    transfer: Arc<dyn FileTransfer>,
    credentials: Credentials,
    concurrency: usize,
}

impl MirrorPublisher {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        transfer: Arc<dyn FileTransfer>,
        credentials: Credentials,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            transfer,
            credentials,
            concurrency: concurrency.max(1),
        }
    }

    /// Mirror the versions in `records` for package `package`
    ///
    /// Fails only if the registry's version list cannot be fetched.
    pub async fn mirror(
        &self,
        slug: &RepoSlug,
        package: &str,
        work_dir: &Path,
        records: &[ReleaseRecord],
    ) -> Result<MirrorReport> {
        let known: HashSet<String> = self
            .registry
            .list_versions(package)
            .await?
            .into_iter()
            .collect();

        debug!(
            "{}: registry {} lists {} version(s) of {}",
            slug,
            self.registry.name(),
            known.len(),
            package
        );

        let known = &known;
        let outcomes: Vec<VersionOutcome> = stream::iter(distinct_versions(records))
            .map(|record| {
                let span = tracing::info_span!("mirror", version = %record.version);
                self.mirror_version(slug, package, work_dir, record, known)
                    .instrument(span)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = MirrorReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        Ok(report)
    }

    async fn mirror_version(
        &self,
        slug: &RepoSlug,
        package: &str,
        work_dir: &Path,
        record: &ReleaseRecord,
        known: &HashSet<String>,
    ) -> VersionOutcome {
        let version = record.version.as_str();

        if known.contains(version) {
            debug!("{}: package {}-{} already exists", slug, package, version);
            return VersionOutcome::AlreadyPresent;
        }

        let normalized = normalize_version(version);
        if normalized != version && known.contains(&normalized) {
            warn!(
                "{}: manifest version {} of {} is listed by the registry as {}; mirroring as declared",
                slug, version, package, normalized
            );
        }

        info!("{}: package {}-{} needs mirroring", slug, package, version);

        let url = self
            .registry
            .package_download_url(&slug.owner, package, version);
        let package_file =
            work_dir.join(format!("{}.nupkg", file_stem(&format!("{package}.{version}"))));

        if let Err(e) = self
            .transfer
            .download(&url, &package_file, Some(&self.credentials))
            .await
        {
            error!(
                "{}: error downloading package {}-{}: {}",
                slug, record.manifest_name, version, e
            );
            return VersionOutcome::Failed;
        }

        if !tokio::fs::try_exists(&package_file).await.unwrap_or(false) {
            error!(
                "{}: error downloading package {}-{}: file not found",
                slug, record.manifest_name, version
            );
            return VersionOutcome::Failed;
        }

        match self.registry.push(&package_file).await {
            Ok(PushOutcome::Published) => {
                info!("{}: pushed {}-{}", slug, package, version);
                VersionOutcome::Pushed
            }
            Ok(PushOutcome::AlreadyExists) => {
                info!(
                    "{}: registry already had {}-{}, push skipped",
                    slug, package, version
                );
                VersionOutcome::Duplicate
            }
            Err(e) => {
                error!(
                    "{}: error mirroring package {}-{}: {}",
                    slug, record.manifest_name, version, e
                );
                VersionOutcome::Failed
            }
        }
    }
}

/// First record per version, in input order
fn distinct_versions(records: &[ReleaseRecord]) -> Vec<&ReleaseRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.version.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeRegistry {
        versions: Mutex<Vec<String>>,
        pushes: Mutex<Vec<String>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl PackageRegistry for FakeRegistry {
        async fn list_versions(&self, _package: &str) -> Result<Vec<String>> {
            Ok(self.versions.lock().unwrap().clone())
        }

        fn package_download_url(&self, owner: &str, package: &str, version: &str) -> String {
            format!("https://registry.test/{owner}/{package}/{version}")
        }

        async fn push(&self, package_file: &Path) -> Result<PushOutcome> {
            let name = package_file.file_name().unwrap().to_string_lossy().into_owned();
            if self.reject.as_deref() == Some(name.as_str()) {
                return Err(IndexError::Registry("rejected".to_string()));
            }
            self.pushes.lock().unwrap().push(name);
            Ok(PushOutcome::Published)
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    /// Writes a placeholder file for every URL except those listed as missing
    #[derive(Default)]
    struct FakeTransfer {
        missing: Vec<String>,
    }

    #[async_trait]
    impl FileTransfer for FakeTransfer {
        async fn download(&self, url: &str, dest: &Path, auth: Option<&Credentials>) -> Result<()> {
            assert!(auth.and_then(Credentials::basic_auth).is_some());
            if self.missing.iter().any(|m| url.ends_with(m.as_str())) {
                return Err(IndexError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                    body: String::new(),
                });
            }
            std::fs::write(dest, url).map_err(|e| IndexError::io(dest, e))
        }
    }

    fn record(tag: &str, version: &str) -> ReleaseRecord {
        ReleaseRecord {
            tag: tag.to_string(),
            name: tag.to_string(),
            is_beta: false,
            version: version.to_string(),
            manifest_name: "Foo".to_string(),
            description: String::new(),
            author: String::new(),
            changelog: String::new(),
            download_url: String::new(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn slug() -> RepoSlug {
        RepoSlug {
            owner: "Acme".to_string(),
            repo: "Foo".to_string(),
        }
    }

    fn publisher(registry: Arc<FakeRegistry>, transfer: FakeTransfer) -> MirrorPublisher {
        MirrorPublisher::new(
            registry,
            Arc::new(transfer),
            Credentials::new("bot", Some("token".to_string())),
            2,
        )
    }

    #[tokio::test]
    async fn test_pushes_only_missing_versions() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(FakeRegistry::default());
        registry.versions.lock().unwrap().push("1.0.0".to_string());

        let records = vec![record("v1.0", "1.0.0"), record("v1.1", "1.1.0")];
        let report = publisher(registry.clone(), FakeTransfer::default())
            .mirror(&slug(), "Foo", temp_dir.path(), &records)
            .await
            .unwrap();

        assert_eq!(report.already_present, 1);
        assert_eq!(report.pushed, 1);
        assert_eq!(*registry.pushes.lock().unwrap(), vec!["Foo.1.1.0.nupkg"]);
        assert!(temp_dir.path().join("Foo.1.1.0.nupkg").is_file());
    }

    #[tokio::test]
    async fn test_duplicate_versions_attempted_once() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(FakeRegistry::default());

        let records = vec![record("v1.0", "1.0.0"), record("v1.0-rebuild", "1.0.0")];
        let report = publisher(registry.clone(), FakeTransfer::default())
            .mirror(&slug(), "Foo", temp_dir.path(), &records)
            .await
            .unwrap();

        assert_eq!(report.attempts(), 1);
        assert_eq!(registry.pushes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_skips_push_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(FakeRegistry::default());
        let transfer = FakeTransfer {
            missing: vec!["1.0.0".to_string()],
        };

        let records = vec![record("v1.0", "1.0.0"), record("v1.1", "1.1.0")];
        let report = publisher(registry.clone(), transfer)
            .mirror(&slug(), "Foo", temp_dir.path(), &records)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.pushed, 1);
        assert_eq!(*registry.pushes.lock().unwrap(), vec!["Foo.1.1.0.nupkg"]);
    }

    #[tokio::test]
    async fn test_push_failure_is_contained() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(FakeRegistry {
            reject: Some("Foo.1.0.0.nupkg".to_string()),
            ..Default::default()
        });

        let records = vec![record("v1.0", "1.0.0"), record("v2.0", "2.0.0")];
        let report = publisher(registry.clone(), FakeTransfer::default())
            .mirror(&slug(), "Foo", temp_dir.path(), &records)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.pushed, 1);
    }

    #[tokio::test]
    async fn test_package_file_stays_in_work_dir() {
        let temp_dir = TempDir::new().unwrap();
        let work_dir = temp_dir.path().join("work");
        std::fs::create_dir(&work_dir).unwrap();
        let registry = Arc::new(FakeRegistry::default());

        let records = vec![record("v1.0", "1.0/../../escape")];
        let report = publisher(registry.clone(), FakeTransfer::default())
            .mirror(&slug(), "Foo", &work_dir, &records)
            .await
            .unwrap();

        assert_eq!(report.pushed, 1);
        let pushed = registry.pushes.lock().unwrap().clone();
        assert_eq!(pushed, vec!["Foo.1.0_.._.._escape.nupkg"]);
        assert!(work_dir.join(&pushed[0]).is_file());
        assert!(!temp_dir.path().join("escape.nupkg").exists());
    }

    #[test]
    fn test_distinct_versions_keeps_first() {
        let records = vec![
            record("a", "1.0.0"),
            record("b", "1.0.0"),
            record("c", "2.0.0"),
        ];
        let tags: Vec<_> = distinct_versions(&records)
            .iter()
            .map(|r| r.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["a", "c"]);
    }
}
