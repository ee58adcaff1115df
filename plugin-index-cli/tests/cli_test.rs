//! Process-level tests for the `plugin-index` binary
//!
//! Only failure paths are exercised here; they exit before any network
//! access.

use std::process::Command;
use tempfile::TempDir;

fn plugin_index() -> Command {
    Command::new(env!("CARGO_BIN_EXE_plugin-index"))
}

#[test]
fn test_missing_repository_list_argument() {
    let output = plugin_index().output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
}

#[test]
fn test_nonexistent_repository_list() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.json");

    let output = plugin_index()
        .arg(&missing)
        .arg("--output")
        .arg(temp_dir.path().join("out"))
        .current_dir(temp_dir.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("repository list not found"), "stderr: {stderr}");
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn test_help_lists_flags() {
    let output = plugin_index().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--verbose", "--output", "--workdir", "--concurrency", "--no-mirror"] {
        assert!(stdout.contains(flag), "missing {flag} in help");
    }
}
