//! Package registry access
//!
//! The mirror step only needs three things from a registry: the versions it
//! already holds, where to download a package from, and a way to push one.
//! [`NuGetRegistry`] implements this for NuGet v3 feeds such as GitHub
//! Packages.

mod nuget;
mod version;

pub use nuget::NuGetRegistry;
pub use version::normalize_version;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The registry accepted a new version
    Published,
    /// The registry already had this version (duplicate push skipped)
    AlreadyExists,
}

#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Normalized versions the registry holds for `package` (empty if unknown)
    async fn list_versions(&self, package: &str) -> Result<Vec<String>>;

    /// URL a package version can be downloaded from, scoped to `owner`
    fn package_download_url(&self, owner: &str, package: &str, version: &str) -> String;

    /// Push a local package archive
    ///
    /// Pushing a version that already exists is not an error.
    async fn push(&self, package_file: &Path) -> Result<PushOutcome>;

    /// Registry identifier for logging
    fn name(&self) -> &'static str;
}
