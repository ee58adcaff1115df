//! Plugin manifest discovery and parsing (manifest.json)
//!
//! Release archives bundle a small JSON descriptor somewhere in their tree.
//! Every field is optional; missing fields fall back to defaults.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

/// Version used when a manifest does not declare one
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Byte order mark written by .NET tooling
const UTF8_BOM: char = '\u{feff}';

/// Fields read from a plugin manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub version: String,
    pub name: String,
    pub description: String,
    pub author: String,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            name: String::new(),
            description: String::new(),
            author: String::new(),
        }
    }
}

impl PluginManifest {
    /// Load a manifest from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Self::from_json(&content, path)
    }

    /// Parse manifest JSON; `path` is only used for error reporting
    ///
    /// A leading UTF-8 byte order mark is ignored.
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let value: Value =
            serde_json::from_str(content).map_err(|source| IndexError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;

        let object = value
            .as_object()
            .ok_or_else(|| IndexError::ManifestNotObject(path.to_path_buf()))?;

        Ok(Self {
            version: field(object, "version").unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            name: field(object, "name").unwrap_or_default(),
            description: field(object, "description").unwrap_or_default(),
            author: field(object, "author").unwrap_or_default(),
        })
    }
}

/// Read a key as text. Strings are taken as-is, other scalars use their JSON form.
fn field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Find `file_name` under `root`, depth-first
///
/// The current directory is checked before descending, so a manifest at the
/// root always wins over one in a subdirectory. Subdirectories are visited
/// in name order. Returns `Ok(None)` when nothing matches.
pub fn find_manifest(root: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    if !root.is_dir() {
        return Err(IndexError::DirectoryNotFound(root.to_path_buf()));
    }
    search(root, file_name)
}

fn search(dir: &Path, file_name: &str) -> Result<Option<PathBuf>> {
    let candidate = dir.join(file_name);
    if candidate.is_file() {
        return Ok(Some(candidate));
    }

    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| IndexError::io(dir, e))? {
        let entry = entry.map_err(|e| IndexError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| IndexError::io(entry.path(), e))?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();

    for subdir in subdirs {
        if let Some(found) = search(&subdir, file_name)? {
            return Ok(Some(found));
        }
    }

    Ok(None)
}
