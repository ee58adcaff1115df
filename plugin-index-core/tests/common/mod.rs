//! Shared fixtures for integration tests
//!
//! In-memory implementations of the release source, package registry and
//! file transfer, plus helpers for building release archives.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use plugin_index_core::config::{Credentials, RepoSlug};
use plugin_index_core::registry::{PackageRegistry, PushOutcome};
use plugin_index_core::source::{Release, ReleaseAsset, ReleaseSource};
use plugin_index_core::transfer::FileTransfer;
use plugin_index_core::{IndexError, Result, Services};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};
use zip::write::SimpleFileOptions;

pub const REGISTRY_URL: &str = "https://registry.test";
pub const INDEX_URL: &str = "https://index.test/plugins";

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Zip archive bytes containing `(name, content)` entries
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Manifest JSON with the usual fields
pub fn manifest_json(name: &str, version: &str) -> String {
    serde_json::json!({
        "name": name,
        "version": version,
        "description": format!("{name} plugin"),
        "author": "Acme",
    })
    .to_string()
}

/// Release with the given assets, published on `day` of January 2024
pub fn release(tag: &str, prerelease: bool, day: u32, assets: &[(&str, &str)]) -> Release {
    let date = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
    Release {
        tag_name: tag.to_string(),
        name: Some(format!("Release {tag}")),
        prerelease,
        body: Some(format!("Changes in {tag}")),
        created_at: date,
        published_at: Some(date),
        assets: assets
            .iter()
            .map(|(name, url)| ReleaseAsset {
                name: name.to_string(),
                browser_download_url: url.to_string(),
                size: 0,
            })
            .collect(),
    }
}

/// Release source serving canned releases per `owner/repo`
#[derive(Default)]
pub struct FakeSource {
    releases: Mutex<HashMap<String, Vec<Release>>>,
}

impl FakeSource {
    pub fn add(&self, slug: &str, releases: Vec<Release>) {
        self.releases
            .lock()
            .unwrap()
            .insert(slug.to_string(), releases);
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn list_releases(&self, slug: &RepoSlug) -> Result<Vec<Release>> {
        let key = slug.to_string();
        self.releases
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| IndexError::HttpStatus {
                url: format!("https://api.test/repos/{key}/releases"),
                status: 404,
                body: "Not Found".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Registry whose known versions are exactly the packages pushed to it
#[derive(Default)]
pub struct FakeRegistry {
    pushes: Mutex<Vec<String>>,
}

impl FakeRegistry {
    /// File names pushed so far, in push order
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn list_versions(&self, package: &str) -> Result<Vec<String>> {
        let prefix = format!("{package}.");
        Ok(self
            .pushes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|name| name.strip_prefix(&prefix)?.strip_suffix(".nupkg"))
            .map(str::to_string)
            .collect())
    }

    fn package_download_url(&self, owner: &str, package: &str, version: &str) -> String {
        format!("{REGISTRY_URL}/{owner}/{package}/{version}")
    }

    async fn push(&self, package_file: &Path) -> Result<PushOutcome> {
        let name = package_file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let mut pushes = self.pushes.lock().unwrap();
        if pushes.contains(&name) {
            return Ok(PushOutcome::AlreadyExists);
        }
        pushes.push(name);
        Ok(PushOutcome::Published)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Serves registered URLs from memory; registry packages are synthesized
#[derive(Default)]
pub struct FakeTransfer {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransfer {
    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.to_string(), bytes);
    }

    /// Every URL requested so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn download(&self, url: &str, dest: &Path, auth: Option<&Credentials>) -> Result<()> {
        self.requests.lock().unwrap().push(url.to_string());

        let bytes = if url.starts_with(REGISTRY_URL) {
            if auth.and_then(Credentials::basic_auth).is_none() {
                return Err(IndexError::HttpStatus {
                    url: url.to_string(),
                    status: 401,
                    body: String::new(),
                });
            }
            url.as_bytes().to_vec()
        } else {
            match self.files.lock().unwrap().get(url) {
                Some(bytes) => bytes.clone(),
                None => {
                    return Err(IndexError::HttpStatus {
                        url: url.to_string(),
                        status: 404,
                        body: String::new(),
                    })
                }
            }
        };

        std::fs::write(dest, bytes).map_err(|e| IndexError::io(dest, e))
    }
}

/// Fakes bundled as [`Services`], with handles kept for assertions
pub struct FakeServices {
    pub source: Arc<FakeSource>,
    pub registry: Arc<FakeRegistry>,
    pub transfer: Arc<FakeTransfer>,
}

impl FakeServices {
    pub fn new() -> Self {
        Self {
            source: Arc::new(FakeSource::default()),
            registry: Arc::new(FakeRegistry::default()),
            transfer: Arc::new(FakeTransfer::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            source: self.source.clone(),
            registry: self.registry.clone(),
            transfer: self.transfer.clone(),
        }
    }

    /// Register a release asset zip containing a manifest at `manifest_path`
    pub fn serve_plugin_zip(&self, url: &str, manifest_path: &str, manifest: &str) {
        self.transfer
            .serve(url, zip_bytes(&[(manifest_path, manifest), ("readme.txt", "hi")]));
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("bot", Some("token".to_string()))
}
