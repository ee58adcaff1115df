//! Zip extraction for release archives

use std::fs::File;
use std::path::Path;

use crate::error::{IndexError, Result};

/// Extract `archive` into `dest`, creating `dest` if needed
///
/// Entries whose names would escape `dest` are rejected by the zip reader.
/// Returns the number of entries in the archive.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| IndexError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| IndexError::Extract {
        path: archive.to_path_buf(),
        source,
    })?;

    std::fs::create_dir_all(dest).map_err(|e| IndexError::io(dest, e))?;

    let entries = zip.len();
    zip.extract(dest).map_err(|source| IndexError::Extract {
        path: archive.to_path_buf(),
        source,
    })?;

    Ok(entries)
}

/// Async wrapper running [`extract_zip`] on the blocking pool
pub async fn extract_zip_blocking(archive: &Path, dest: &Path) -> Result<usize> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || extract_zip(&archive, &dest)).await?
}
