//! NuGet v3 feed client
//!
//! Resolves the feed's service index once, then uses:
//! - `PackageBaseAddress/3.0.0` to list versions (`<base>/<id>/index.json`)
//! - `PackagePublish/2.0.0` to push packages (multipart `PUT`)

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{normalize_version, PackageRegistry, PushOutcome};
use crate::config::Credentials;
use crate::error::{IndexError, Result};

/// GitHub Packages NuGet host
pub const GITHUB_NUGET_HOST: &str = "https://nuget.pkg.github.com";

/// Timeout for a single package push
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";
const PACKAGE_PUBLISH: &str = "PackagePublish/2.0.0";

#[derive(Debug, Deserialize)]
struct ServiceIndex {
    resources: Vec<ServiceResource>,
}

#[derive(Debug, Deserialize)]
struct ServiceResource {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "@type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct VersionList {
    versions: Vec<String>,
}

/// Endpoints resolved from the service index
#[derive(Debug, Clone, PartialEq, Eq)]
struct FeedEndpoints {
    package_base: String,
    publish: String,
}

impl ServiceIndex {
    fn resource(&self, kind: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.id.trim_end_matches('/'))
    }

    fn endpoints(&self) -> Result<FeedEndpoints> {
        let find = |kind: &str| {
            self.resource(kind)
                .map(str::to_string)
                .ok_or_else(|| IndexError::Registry(format!("Service index has no {kind} resource")))
        };
        Ok(FeedEndpoints {
            package_base: find(PACKAGE_BASE_ADDRESS)?,
            publish: find(PACKAGE_PUBLISH)?,
        })
    }
}

/// NuGet v3 registry client with basic-auth credentials
pub struct NuGetRegistry {
    client: reqwest::Client,
    host: String,
    feed_owner: String,
    credentials: Credentials,
    endpoints: OnceCell<FeedEndpoints>,
}

impl NuGetRegistry {
    /// Registry for `https://nuget.pkg.github.com/<feed_owner>/index.json`
    pub fn github(client: reqwest::Client, feed_owner: &str, credentials: Credentials) -> Self {
        Self::with_host(client, GITHUB_NUGET_HOST, feed_owner, credentials)
    }

    pub fn with_host(
        client: reqwest::Client,
        host: impl Into<String>,
        feed_owner: &str,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            host: host.into().trim_end_matches('/').to_string(),
            feed_owner: feed_owner.to_string(),
            credentials,
            endpoints: OnceCell::new(),
        }
    }

    pub fn service_index_url(&self) -> String {
        format!("{}/{}/index.json", self.host, self.feed_owner)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.credentials.basic_auth() {
            Some((user, token)) => request.basic_auth(user, Some(token)),
            None => request,
        }
    }

    async fn endpoints(&self) -> Result<&FeedEndpoints> {
        self.endpoints
            .get_or_try_init(|| async {
                let url = self.service_index_url();
                debug!("Resolving NuGet service index {}", url);

                let response = self
                    .authorized(self.client.get(&url))
                    .send()
                    .await
                    .map_err(|e| IndexError::http(&url, e))?;
                let response = check_status(response, &url).await?;

                let index: ServiceIndex = response
                    .json()
                    .await
                    .map_err(|e| IndexError::http(&url, e))?;
                index.endpoints()
            })
            .await
    }
}

async fn check_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IndexError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PackageRegistry for NuGetRegistry {
    async fn list_versions(&self, package: &str) -> Result<Vec<String>> {
        let endpoints = self.endpoints().await?;
        let url = format!(
            "{}/{}/index.json",
            endpoints.package_base,
            package.to_lowercase()
        );

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| IndexError::http(&url, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Package {} not found in registry", package);
            return Ok(Vec::new());
        }

        let response = check_status(response, &url).await?;
        let list: VersionList = response
            .json()
            .await
            .map_err(|e| IndexError::http(&url, e))?;

        Ok(list.versions.iter().map(|v| normalize_version(v)).collect())
    }

    fn package_download_url(&self, owner: &str, package: &str, version: &str) -> String {
        format!(
            "{}/{}/download/{}/{}/{}.{}.nupkg",
            self.host, owner, package, version, package, version
        )
    }

    async fn push(&self, package_file: &Path) -> Result<PushOutcome> {
        let token = self.credentials.token.as_deref().ok_or_else(|| {
            IndexError::Registry("Pushing packages requires a registry token".to_string())
        })?;

        let endpoints = self.endpoints().await?;
        let url = endpoints.publish.clone();

        let bytes = tokio::fs::read(package_file)
            .await
            .map_err(|e| IndexError::io(package_file, e))?;
        let file_name = package_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.nupkg".to_string());

        let form = Form::new().part("package", Part::bytes(bytes).file_name(file_name));

        let response = self
            .authorized(self.client.put(&url))
            .header("X-NuGet-ApiKey", token)
            .multipart(form)
            .timeout(PUSH_TIMEOUT)
            .send()
            .await
            .map_err(|e| IndexError::http(&url, e))?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(PushOutcome::AlreadyExists);
        }

        check_status(response, &url).await?;
        Ok(PushOutcome::Published)
    }

    fn name(&self) -> &'static str {
        "nuget"
    }
}
