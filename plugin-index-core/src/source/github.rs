//! GitHub releases API client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use tracing::debug;

use super::{Release, ReleaseSource};
use crate::config::{Credentials, RepoSlug};
use crate::error::{IndexError, Result};

/// Releases requested per page (GitHub maximum)
const PER_PAGE: usize = 100;

/// Stop paginating after this many pages
const MAX_PAGES: usize = 50;

/// Lists releases through `GET /repos/{owner}/{repo}/releases`
#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubReleaseSource {
    /// Default GitHub API URL
    pub const DEFAULT_BASE_URL: &'static str = "https://api.github.com";

    pub fn new(client: reqwest::Client, credentials: &Credentials) -> Self {
        Self::with_base_url(client, Self::DEFAULT_BASE_URL, credentials)
    }

    /// Point the client at a different API root (GitHub Enterprise)
    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        credentials: &Credentials,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: credentials.token.clone(),
        }
    }

    fn releases_url(&self, slug: &RepoSlug, page: usize) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page={}&page={}",
            self.base_url, slug.owner, slug.repo, PER_PAGE, page
        )
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn fetch_page(&self, slug: &RepoSlug, page: usize) -> Result<Vec<Release>> {
        let url = self.releases_url(slug, page);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| IndexError::http(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::HttpStatus {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<Release>>()
            .await
            .map_err(|e| IndexError::http(&url, e))
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleaseSource {
    async fn list_releases(&self, slug: &RepoSlug) -> Result<Vec<Release>> {
        let mut releases = Vec::new();

        for page in 1..=MAX_PAGES {
            let batch = self.fetch_page(slug, page).await?;
            let count = batch.len();
            debug!("{}: page {} returned {} releases", slug, page, count);

            releases.extend(batch);
            if count < PER_PAGE {
                break;
            }
        }

        Ok(releases)
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
