//! Run driver
//!
//! Loads the repository list, reconciles every repository with bounded
//! concurrency and writes the summary index once all of them have settled.

use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Instrument};

use crate::config::{load_repositories, BuilderOptions, Credentials, RepositoryConfig};
use crate::error::{IndexError, Result};
use crate::index::write_summary_index;
use crate::mirror::MirrorReport;
use crate::reconciler::{ReconcileOutcome, RepositoryReconciler};
use crate::registry::{NuGetRegistry, PackageRegistry};
use crate::source::{GitHubReleaseSource, ReleaseSource};
use crate::transfer::{FileTransfer, HttpTransfer};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// External services a run talks to
#[derive(Clone)]
pub struct Services {
    pub source: Arc<dyn ReleaseSource>,
    pub registry: Arc<dyn PackageRegistry>,
    pub transfer: Arc<dyn FileTransfer>,
}

impl Services {
    /// GitHub releases, GitHub Packages NuGet feed and plain HTTP downloads
    /// sharing one client
    pub fn http(feed_owner: &str, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("plugin-index/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| IndexError::http("<client>", e))?;

        Ok(Self {
            source: Arc::new(GitHubReleaseSource::new(client.clone(), credentials)),
            registry: Arc::new(NuGetRegistry::github(
                client.clone(),
                feed_owner,
                credentials.clone(),
            )),
            transfer: Arc::new(HttpTransfer::new(client)),
        })
    }
}

/// Result for one configured repository
#[derive(Debug, Clone)]
pub struct RepositoryOutcome {
    pub name: String,
    pub repo_url: String,
    /// Records that made it into the index entry
    pub releases: usize,
    /// Releases left out of the index entry
    pub releases_skipped: usize,
    pub latest_version: Option<String>,
    pub latest_beta_version: Option<String>,
    pub mirror: Option<MirrorReport>,
    /// Set when the repository failed as a whole
    pub error: Option<String>,
}

impl RepositoryOutcome {
    fn succeeded(config: &RepositoryConfig, outcome: &ReconcileOutcome) -> Self {
        Self {
            name: config.name.clone(),
            repo_url: config.repo_url.clone(),
            releases: outcome.entry.releases.len(),
            releases_skipped: outcome.releases_skipped,
            latest_version: outcome.entry.latest.as_ref().map(|r| r.version.clone()),
            latest_beta_version: outcome
                .entry
                .latest_beta
                .as_ref()
                .map(|r| r.version.clone()),
            mirror: outcome.mirror,
            error: None,
        }
    }

    fn failed(config: &RepositoryConfig, error: &IndexError) -> Self {
        Self {
            name: config.name.clone(),
            repo_url: config.repo_url.clone(),
            releases: 0,
            releases_skipped: 0,
            latest_version: None,
            latest_beta_version: None,
            mirror: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a run produced, in repository list order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub repositories: Vec<RepositoryOutcome>,
}

impl RunReport {
    pub fn succeeded_count(&self) -> usize {
        self.repositories.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.repositories.len() - self.succeeded_count()
    }

    /// Total versions pushed across every repository
    pub fn pushed_count(&self) -> usize {
        self.repositories
            .iter()
            .filter_map(|r| r.mirror)
            .map(|m| m.pushed)
            .sum()
    }
}

/// Builds the plugin index for a list of repositories
pub struct IndexBuilder {
    options: Arc<BuilderOptions>,
    services: Services,
    credentials: Credentials,
}

impl IndexBuilder {
    /// Builder talking to GitHub and the `feed_owner` NuGet feed
    pub fn new(options: BuilderOptions, feed_owner: &str, credentials: Credentials) -> Result<Self> {
        let services = Services::http(feed_owner, &credentials)?;
        Ok(Self::with_services(options, services, credentials))
    }

    pub fn with_services(options: BuilderOptions, services: Services, credentials: Credentials) -> Self {
        Self {
            options: Arc::new(options),
            services,
            credentials,
        }
    }

    /// Load the repository list at `path` and run it
    pub async fn run_from_file(&self, path: &Path) -> Result<RunReport> {
        let repositories = load_repositories(path)?;
        info!(
            "Loaded {} repositories from {}",
            repositories.len(),
            path.display()
        );
        self.run(repositories).await
    }

    /// Reconcile every repository, then write the summary index
    ///
    /// Per-repository failures are logged and reported; only a failure to
    /// write the summary index fails the run.
    pub async fn run(&self, repositories: Vec<RepositoryConfig>) -> Result<RunReport> {
        let mut results: Vec<(usize, RepositoryConfig, Result<ReconcileOutcome>)> =
            stream::iter(repositories.into_iter().enumerate())
                .map(|(position, config)| {
                    let span = tracing::info_span!("repo", name = %config.name);
                    async move {
                        let result = self.reconcile(&config).await;
                        (position, config, result)
                    }
                    .instrument(span)
                })
                .buffer_unordered(self.options.fan_out())
                .collect()
                .await;

        results.sort_by_key(|(position, _, _)| *position);

        let mut summaries = Vec::new();
        let mut report = RunReport::default();
        for (_, config, result) in results {
            match result {
                Ok(outcome) => {
                    summaries.push(outcome.entry.summary());
                    report
                        .repositories
                        .push(RepositoryOutcome::succeeded(&config, &outcome));
                }
                Err(e) => {
                    error!("{} ({}): {}", config.name, config.repo_url, e);
                    report
                        .repositories
                        .push(RepositoryOutcome::failed(&config, &e));
                }
            }
        }

        let summary_path = write_summary_index(&self.options.output_dir, summaries).await?;
        info!(
            "Wrote {} ({} succeeded, {} failed)",
            summary_path.display(),
            report.succeeded_count(),
            report.failed_count()
        );

        Ok(report)
    }

    async fn reconcile(&self, config: &RepositoryConfig) -> Result<ReconcileOutcome> {
        let reconciler = RepositoryReconciler::new(
            config.clone(),
            self.options.clone(),
            self.services.clone(),
            self.credentials.clone(),
        )?;
        reconciler.build().await
    }
}
