//! File transfer over HTTP
//!
//! Release assets, previously published index entries and registry packages
//! are all fetched through [`FileTransfer`], which streams a URL to disk.

use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::Credentials;
use crate::error::{IndexError, Result};

/// Downloads a URL into a local file
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Download `url` to `dest`, overwriting it
    ///
    /// When `auth` carries a token the request uses HTTP basic auth.
    /// Non-success statuses are errors and leave no file behind.
    async fn download(&self, url: &str, dest: &Path, auth: Option<&Credentials>) -> Result<()>;
}

/// [`FileTransfer`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn stream_to_file(
        &self,
        mut response: reqwest::Response,
        url: &str,
        dest: &Path,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| IndexError::io(dest, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| IndexError::http(url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| IndexError::io(dest, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| IndexError::io(dest, e))?;
        Ok(written)
    }
}

#[async_trait]
impl FileTransfer for HttpTransfer {
    async fn download(&self, url: &str, dest: &Path, auth: Option<&Credentials>) -> Result<()> {
        let mut request = self.client.get(url);
        if let Some((user, token)) = auth.and_then(Credentials::basic_auth) {
            request = request.basic_auth(user, Some(token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| IndexError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            discard(dest).await;
            return Err(IndexError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        match self.stream_to_file(response, url, dest).await {
            Ok(bytes) => {
                debug!("Downloaded {} bytes from {} to {}", bytes, url, dest.display());
                Ok(())
            }
            Err(e) => {
                discard(dest).await;
                Err(e)
            }
        }
    }
}

/// Remove a stale or truncated destination so it is never mistaken for a
/// finished download
async fn discard(dest: &Path) {
    if let Err(e) = tokio::fs::remove_file(dest).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!("Could not remove {}: {}", dest.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases/Foo.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip bytes".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("Foo.zip");
        let url = format!("{}/releases/Foo.zip", server.uri());

        HttpTransfer::new(reqwest::Client::new())
            .download(&url, &dest, None)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"zip bytes");
    }

    #[tokio::test]
    async fn test_download_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Acme/download/Foo/1.0.0/Foo.1.0.0.nupkg"))
            .and(basic_auth("bot", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"nupkg".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("Foo.1.0.0.nupkg");
        let url = format!("{}/Acme/download/Foo/1.0.0/Foo.1.0.0.nupkg", server.uri());
        let credentials = Credentials::new("bot", Some("token".to_string()));

        HttpTransfer::new(reqwest::Client::new())
            .download(&url, &dest, Some(&credentials))
            .await
            .unwrap();

        assert!(dest.is_file());
    }

    #[tokio::test]
    async fn test_error_status_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.zip"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("missing.zip");
        std::fs::write(&dest, "stale download from an earlier run").unwrap();

        let err = HttpTransfer::new(reqwest::Client::new())
            .download(&format!("{}/missing.zip", server.uri()), &dest, None)
            .await
            .unwrap_err();

        match err {
            IndexError::HttpStatus { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, "Not Found");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unwritable_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("no-such-dir").join("Foo.zip");

        let err = HttpTransfer::new(reqwest::Client::new())
            .download(&format!("{}/Foo.zip", server.uri()), &dest, None)
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::Io { .. }));
        assert!(!dest.exists());
    }
}
