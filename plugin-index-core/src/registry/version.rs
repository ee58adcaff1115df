//! NuGet-style version normalization
//!
//! NuGet reports versions in normalized form: at least three numeric
//! components, no leading zeros, a zero fourth component dropped and build
//! metadata removed. Prerelease labels are kept as-is.

use semver::Prerelease;

/// Normalize a version string the way NuGet does
///
/// Strings that are not NuGet versions are returned trimmed but otherwise
/// unchanged.
pub fn normalize_version(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_metadata = trimmed.split('+').next().unwrap_or(trimmed);

    let (core, prerelease) = match without_metadata.split_once('-') {
        Some((core, label)) => (core, Some(label)),
        None => (without_metadata, None),
    };

    let parsed: Option<Vec<u64>> = core.split('.').map(|p| p.parse::<u64>().ok()).collect();
    let Some(mut parts) = parsed.filter(|p| (1..=4).contains(&p.len())) else {
        return trimmed.to_string();
    };

    if let Some(label) = prerelease {
        if label.is_empty() || Prerelease::new(label).is_err() {
            return trimmed.to_string();
        }
    }

    while parts.len() < 3 {
        parts.push(0);
    }
    if parts.len() == 4 && parts[3] == 0 {
        parts.pop();
    }

    let mut normalized = parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".");

    if let Some(label) = prerelease {
        normalized.push('-');
        normalized.push_str(label);
    }

    normalized
}
