//! Plugin index builder library
//!
//! Discovers plugin releases on GitHub, extracts the `manifest.json` bundled
//! in each release archive, regenerates the public index entries and mirrors
//! missing package versions into a NuGet registry.
//!
//! # Architecture
//!
//! ```text
//! repositories.json
//!        │
//!        ▼
//!   IndexBuilder ──────────────► out/index.json
//!        │ (one per repository)
//!        ▼
//!   RepositoryReconciler ──────► out/plugins/<name>.json
//!        │
//!        ├── ReleaseSource   (GitHub releases API)
//!        ├── FileTransfer    (asset + package downloads)
//!        └── MirrorPublisher ──► PackageRegistry (NuGet v3)
//! ```

pub mod archive;
pub mod config;
pub mod driver;
pub mod error;
pub mod index;
pub mod manifest;
pub mod mirror;
pub mod reconciler;
pub mod registry;
pub mod release;
pub mod source;
pub mod transfer;

pub use config::{BuilderOptions, Credentials, RepoSlug, RepositoryConfig};
pub use driver::{IndexBuilder, RepositoryOutcome, RunReport, Services};
pub use error::{IndexError, Result};
pub use index::{IndexSummary, RepositoryIndexEntry};
pub use mirror::{MirrorPublisher, MirrorReport};
pub use reconciler::{ReconcileOutcome, RepositoryReconciler};
pub use release::ReleaseRecord;
