//! Error types for index building and mirroring

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised while discovering releases, building records or mirroring packages
#[derive(Error, Debug)]
pub enum IndexError {
    /// A directory that must exist was not found
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Repository URL does not point at a GitHub repository
    #[error("Invalid repository URL '{0}'. Expected https://github.com/<owner>/<repo>")]
    InvalidRepositoryUrl(String),

    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The repository list could not be parsed
    #[error("Failed to parse repository list {}: {source}", .path.display())]
    RepositoryList {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A manifest file is not valid JSON
    #[error("Failed to parse manifest {}: {source}", .path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A manifest file parsed but is not a JSON object
    #[error("Manifest {} is not a JSON object", .0.display())]
    ManifestNotObject(PathBuf),

    /// No manifest was found inside an extracted release
    #[error("No {file} found for release {tag}")]
    ManifestNotFound { tag: String, file: String },

    /// Release has no packaged zip asset
    #[error("No zip found for release {tag} ({assets})")]
    NoReleaseAsset { tag: String, assets: String },

    /// Transport-level HTTP failure
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}{}", status_detail(.body))]
    HttpStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// Zip archive could not be extracted
    #[error("Failed to extract {}: {source}", .path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Registry returned something we could not use
    #[error("Registry error: {0}")]
    Registry(String),

    /// Serializing an index document failed
    #[error("Failed to serialize {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn status_detail(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

impl IndexError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a reqwest error with the URL being requested
    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.into(),
            source,
        }
    }
}
