//! Integration tests for the fileintel CLI

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Command isolated from the user's config, the working directory and the environment
fn fileintel(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fileintel").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .env_remove("FILEINTEL_RUN__DEST")
        .env_remove("FILEINTEL_RUN__ROOTS");
    cmd
}

/// Source tree with one image and one text note
fn sample_tree(base: &Path) -> PathBuf {
    let src = base.join("src");
    fs::create_dir_all(src.join("holiday")).unwrap();
    RgbImage::from_pixel(4, 3, Rgb([200, 30, 30]))
        .save(src.join("holiday/photo.png"))
        .unwrap();
    fs::write(src.join("note.txt"), "remember the milk").unwrap();
    src
}

fn audit_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("audit_") && name.ends_with(".csv")
        })
        .collect()
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    fileintel(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Classify files"));
}

/// Test CLI responds to --version
#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().unwrap();
    fileintel(temp_dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fileintel"));
}

/// Test invalid subcommand shows error
#[test]
fn test_invalid_subcommand() {
    let temp_dir = TempDir::new().unwrap();
    fileintel(temp_dir.path())
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test a full run copies images and writes the audit into the destination
#[test]
fn test_run_copies_matches_and_writes_audit() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());
    let dest = temp_dir.path().join("sorted");

    fileintel(temp_dir.path())
        .arg("run")
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 files"));

    assert!(dest.join("holiday/photo.png").is_file());
    assert!(!dest.join("note.txt").exists());

    let audits = audit_files(&dest);
    assert_eq!(audits.len(), 1);
    let audit = fs::read_to_string(&audits[0]).unwrap();
    let mut lines = audit.lines();
    assert_eq!(lines.next(), Some("time,rule,src,mime,ext,sha256,size,copied_to,metadata"));
    let row = lines.next().unwrap();
    assert!(row.contains("All images"));
    assert!(row.contains("image/png"));
    assert_eq!(lines.next(), None);
}

/// Test unmatched files get rows when requested
#[test]
fn test_run_record_unmatched() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());
    let dest = temp_dir.path().join("sorted");

    fileintel(temp_dir.path())
        .args(["-q", "run", "--record-unmatched", "--dest"])
        .arg(&dest)
        .arg(&src)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let audit = fs::read_to_string(&audit_files(&dest)[0]).unwrap();
    assert_eq!(audit.lines().count(), 3);
    assert!(audit.contains("(no match)"));
    assert!(audit.contains("(not copied)"));
}

/// Test dry run writes nothing to the destination
#[test]
fn test_dry_run_leaves_destination_alone() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());
    let dest = temp_dir.path().join("sorted");
    let audit_dir = temp_dir.path().join("audits");
    fs::create_dir_all(&audit_dir).unwrap();

    fileintel(temp_dir.path())
        .arg("run")
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .arg("--dry-run")
        .arg("--audit-dir")
        .arg(&audit_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Would copy"));

    assert!(!dest.exists());
    let audit = fs::read_to_string(&audit_files(&audit_dir)[0]).unwrap();
    assert!(audit.contains("(not copied)"));
}

/// Test JSON summary is machine readable
#[test]
fn test_run_json_summary() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());
    let dest = temp_dir.path().join("sorted");

    let assert = fileintel(temp_dir.path())
        .arg("run")
        .arg(&src)
        .arg("--dest")
        .arg(&dest)
        .args(["--format", "json"])
        .assert()
        .success();

    let summary: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(summary["dry_run"], false);
    assert_eq!(summary["stats"]["files_discovered"], 2);
    assert_eq!(summary["stats"]["files_matched"], 1);
    assert_eq!(summary["stats"]["files_copied"], 1);
    assert_eq!(summary["failures"], serde_json::json!([]));
}

/// Test a missing source root aborts before anything is created
#[test]
fn test_missing_root_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("sorted");

    fileintel(temp_dir.path())
        .arg("run")
        .arg(temp_dir.path().join("no-such-card"))
        .arg("--dest")
        .arg(&dest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));

    assert!(!dest.exists());
}

/// Test a run without a destination is rejected
#[test]
fn test_missing_destination_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());

    fileintel(temp_dir.path())
        .arg("run")
        .arg(&src)
        .assert()
        .failure()
        .stderr(predicate::str::contains("destination"));
}

/// Test rules from a working-directory config file drive classification
#[test]
fn test_project_config_rules() {
    let temp_dir = TempDir::new().unwrap();
    let src = sample_tree(temp_dir.path());
    let dest = temp_dir.path().join("sorted");
    fs::write(
        temp_dir.path().join("fileintel.toml"),
        r#"
[[rules]]
name = "Notes"
ext_patterns = ["txt"]
"#,
    )
    .unwrap();

    fileintel(temp_dir.path())
        .args(["-q", "run", "--dest"])
        .arg(&dest)
        .arg(&src)
        .assert()
        .success();

    assert!(dest.join("note.txt").is_file());
    assert!(!dest.join("holiday/photo.png").exists());
}

/// Test the rules command lists the default rules
#[test]
fn test_rules_listing() {
    let temp_dir = TempDir::new().unwrap();
    fileintel(temp_dir.path())
        .arg("rules")
        .assert()
        .success()
        .stdout(predicate::str::contains("All images"))
        .stdout(predicate::str::contains("image/*"));

    let assert = fileintel(temp_dir.path())
        .args(["rules", "--format", "json"])
        .assert()
        .success();
    let rules: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(rules[0]["name"], "All images");
}

/// Test configuration validation
#[test]
fn test_config_operations() {
    let temp_dir = TempDir::new().unwrap();

    fileintel(temp_dir.path())
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    let config_path = temp_dir.path().join("broken.toml");
    fs::write(
        &config_path,
        r#"
[[rules]]
name = "Twice"
mime_patterns = ["image/*"]

[[rules]]
name = "Twice"
ext_patterns = [".png"]
"#,
    )
    .unwrap();

    fileintel(temp_dir.path())
        .args(["config", "validate", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Twice"));
}

/// Test config show renders the merged configuration
#[test]
fn test_config_show() {
    let temp_dir = TempDir::new().unwrap();
    fileintel(temp_dir.path())
        .args(["config", "show"])
        .env("FILEINTEL_RUN__WORKERS", "3")
        .assert()
        .success()
        .stdout(predicate::str::contains("workers = 3"))
        .stdout(predicate::str::contains("ignore_dirs"));
}
