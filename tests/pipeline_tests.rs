//! End-to-end tests of the classification pipeline as a library

use fileintel::audit::HEADER;
use fileintel::copy::NOT_COPIED;
use fileintel::pipeline::{Pipeline, RunConfig, RunReport};
use fileintel::rules::{NO_MATCH, Rule, RuleSet};
use image::{Rgb, RgbImage};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    base: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let base = fs::canonicalize(temp.path()).unwrap();
        Self { _temp: temp, base }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.base.join(rel)
    }

    fn write(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn image(&self, rel: &str, seed: u8) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(4, 3, Rgb([seed, 128, 255 - seed])).save(&path).unwrap();
        path
    }
}

fn images_rule() -> RuleSet {
    RuleSet::new(vec![Rule::new("All images", ["image/*"], Vec::<&str>::new()).unwrap()]).unwrap()
}

fn config(ws: &Workspace, roots: &[&str], rules: RuleSet) -> RunConfig {
    RunConfig {
        audit_dir: Some(ws.path("audit")),
        ..RunConfig::new(roots.iter().map(|r| ws.path(r)).collect(), ws.path("out"), rules)
    }
}

/// Audit rows keyed by column name
fn audit_rows(report: &RunReport) -> Vec<BTreeMap<String, String>> {
    let mut reader = csv::Reader::from_path(&report.audit_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers
                .iter()
                .zip(record.iter())
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

/// Every file under `dir` with its content
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut files = BTreeMap::new();
    if !dir.exists() {
        return files;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            files.insert(path.clone(), Vec::new());
            files.extend(snapshot(&path));
        } else {
            files.insert(path.clone(), fs::read(&path).unwrap());
        }
    }
    files
}

#[test]
fn test_photo_and_note_end_to_end() {
    let ws = Workspace::new();
    let photo = ws.image("src/holiday/photo.png", 10);
    ws.write("src/note.txt", b"remember the milk");

    let report = Pipeline::new(config(&ws, &["src"], images_rule())).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["rule"], "All images");
    assert_eq!(row["src"], photo.display().to_string());
    assert_eq!(row["mime"], "image/png");
    assert_eq!(row["ext"], ".png");
    assert_eq!(row["sha256"].len(), 64);
    assert_eq!(row["size"], fs::metadata(&photo).unwrap().len().to_string());
    assert_eq!(row["copied_to"], ws.path("out/holiday/photo.png").display().to_string());

    let metadata: serde_json::Value = serde_json::from_str(&row["metadata"]).unwrap();
    assert_eq!(metadata["width"], "4");
    assert_eq!(metadata["height"], "3");
    assert_eq!(metadata["format"], "PNG");

    assert_eq!(fs::read(ws.path("out/holiday/photo.png")).unwrap(), fs::read(&photo).unwrap());
    assert!(!ws.path("out/note.txt").exists());
    assert_eq!(report.stats.files_discovered, 2);
    assert_eq!(report.stats.files_unmatched, 1);
}

#[test]
fn test_unmatched_files_recorded_when_enabled() {
    let ws = Workspace::new();
    ws.image("src/photo.png", 10);
    ws.write("src/note.txt", b"remember the milk");

    let mut config = config(&ws, &["src"], images_rule());
    config.record_unmatched = true;
    let report = Pipeline::new(config).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows.len(), 2);
    let note = rows.iter().find(|r| r["src"].ends_with("note.txt")).unwrap();
    assert_eq!(note["rule"], NO_MATCH);
    assert_eq!(note["mime"], "text/plain");
    assert_eq!(note["sha256"], "");
    assert_eq!(note["copied_to"], NOT_COPIED);
    assert_eq!(note["metadata"], "{}");
    assert!(!ws.path("out/note.txt").exists());
}

#[test]
fn test_first_matching_rule_wins() {
    let ws = Workspace::new();
    ws.image("src/cat.jpg", 1);
    ws.image("src/dog.png", 2);

    let rules = RuleSet::new(vec![
        Rule::new("JPEG files", Vec::<&str>::new(), [".jpg"]).unwrap(),
        Rule::new("All images", ["image/*"], Vec::<&str>::new()).unwrap(),
    ])
    .unwrap();
    let report = Pipeline::new(config(&ws, &["src"], rules)).run().unwrap();
    let rows = audit_rows(&report);

    let cat = rows.iter().find(|r| r["src"].ends_with("cat.jpg")).unwrap();
    assert_eq!(cat["mime"], "image/jpeg");
    assert_eq!(cat["rule"], "JPEG files");
    let dog = rows.iter().find(|r| r["src"].ends_with("dog.png")).unwrap();
    assert_eq!(dog["rule"], "All images");
}

#[test]
fn test_dry_run_leaves_destination_untouched() {
    let ws = Workspace::new();
    ws.image("src/a/b/c.png", 3);
    ws.image("src/top.png", 4);
    ws.write("out/existing/keep.txt", b"prior output");
    let before = snapshot(&ws.path("out"));

    let mut config = config(&ws, &["src"], images_rule());
    config.dry_run = true;
    let report = Pipeline::new(config).run().unwrap();

    assert_eq!(snapshot(&ws.path("out")), before);
    assert!(report.audit_path.starts_with(ws.path("audit")));
    let rows = audit_rows(&report);
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row["copied_to"], NOT_COPIED);
        assert_eq!(row["sha256"].len(), 64);
        assert_ne!(row["metadata"], "{}");
    }
    assert_eq!(report.stats.files_planned, 2);
}

#[test]
fn test_dry_run_over_identical_existing_output() {
    let ws = Workspace::new();
    ws.write("src/app.log", b"2024-01-01 started\n");
    ws.write("out/app.log", b"2024-01-01 started\n");
    let rules = RuleSet::new(vec![Rule::new("Logs", Vec::<&str>::new(), [".log"]).unwrap()]).unwrap();

    let mut config = config(&ws, &["src"], rules);
    config.dry_run = true;
    let report = Pipeline::new(config).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["copied_to"], NOT_COPIED);
    assert_eq!(report.stats.files_planned, 1);
    assert_eq!(report.stats.files_already_present, 0);
}

#[test]
fn test_dry_run_without_destination_creates_nothing() {
    let ws = Workspace::new();
    ws.image("src/photo.png", 5);

    let mut config = config(&ws, &["src"], images_rule());
    config.dry_run = true;
    Pipeline::new(config).run().unwrap();

    assert!(!ws.path("out").exists());
}

#[test]
fn test_relative_structure_is_preserved() {
    let ws = Workspace::new();
    ws.image("src/a/b/c.jpg", 6);

    Pipeline::new(config(&ws, &["src"], images_rule())).run().unwrap();

    assert!(ws.path("out/a/b/c.jpg").is_file());
    assert!(!ws.path("out/c.jpg").exists());
}

#[test]
fn test_collisions_keep_both_files() {
    let ws = Workspace::new();
    let first = ws.image("card1/DCIM/IMG_0001.png", 7);
    let second = ws.image("card2/DCIM/IMG_0001.png", 8);

    let report = Pipeline::new(config(&ws, &["card1", "card2"], images_rule())).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["copied_to"], ws.path("out/DCIM/IMG_0001.png").display().to_string());
    assert_eq!(rows[1]["copied_to"], ws.path("out/DCIM/IMG_0001_1.png").display().to_string());
    assert_eq!(fs::read(ws.path("out/DCIM/IMG_0001.png")).unwrap(), fs::read(first).unwrap());
    assert_eq!(fs::read(ws.path("out/DCIM/IMG_0001_1.png")).unwrap(), fs::read(second).unwrap());
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_is_recorded() {
    let ws = Workspace::new();
    let target = ws.write("elsewhere/app.log", b"service started");
    fs::create_dir_all(ws.path("src")).unwrap();
    std::os::unix::fs::symlink(&target, ws.path("src/link.log")).unwrap();

    let mut config = config(&ws, &["src"], images_rule());
    config.record_unmatched = true;
    let report = Pipeline::new(config).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(report.stats.files_discovered, 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["src"], ws.path("src/link.log").display().to_string());
    assert_eq!(rows[0]["rule"], NO_MATCH);
}

#[test]
fn test_rerun_reuses_identical_outputs() {
    let ws = Workspace::new();
    ws.image("src/photo.png", 9);

    let first = Pipeline::new(config(&ws, &["src"], images_rule())).run().unwrap();
    let second = Pipeline::new(config(&ws, &["src"], images_rule())).run().unwrap();

    assert_eq!(audit_rows(&first)[0]["copied_to"], audit_rows(&second)[0]["copied_to"]);
    assert_eq!(second.stats.files_already_present, 1);
    assert!(!ws.path("out/photo_1.png").exists());
}

#[test]
fn test_malformed_image_still_audited() {
    let ws = Workspace::new();
    ws.write("src/broken.png", b"\x89PNG\r\n\x1a\nnot really an image at all");

    let report = Pipeline::new(config(&ws, &["src"], images_rule())).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["rule"], "All images");
    assert_eq!(row["mime"], "image/png");
    assert_eq!(row["ext"], ".png");
    assert_eq!(row["sha256"].len(), 64);
    assert_eq!(row["size"], "34");
    assert_eq!(row["copied_to"], ws.path("out/broken.png").display().to_string());
    assert_eq!(row["metadata"], "{}");
    assert_eq!(report.stats.files_failed, 0);
}

#[test]
fn test_one_record_per_file_in_walk_order() {
    let ws = Workspace::new();
    for i in 0..40 {
        ws.write(&format!("src/dir{}/file{:02}.txt", i % 3, i), format!("file {i}").as_bytes());
    }
    let rules = RuleSet::new(vec![Rule::new("Text", ["text/plain"], Vec::<&str>::new()).unwrap()]).unwrap();

    let mut sequential = config(&ws, &["src", "src"], rules.clone());
    sequential.workers = 1;
    sequential.dry_run = true;
    let mut parallel = config(&ws, &["src"], rules);
    parallel.workers = 8;
    parallel.dry_run = true;

    let sequential = audit_rows(&Pipeline::new(sequential).run().unwrap());
    let parallel = audit_rows(&Pipeline::new(parallel).run().unwrap());

    let sources: Vec<_> = parallel.iter().map(|r| r["src"].clone()).collect();
    assert_eq!(sources.len(), 40);
    assert_eq!(sources.iter().collect::<HashSet<_>>().len(), 40);
    assert_eq!(sources, sequential.iter().map(|r| r["src"].clone()).collect::<Vec<_>>());

    let mut sorted = sources.clone();
    sorted.sort();
    assert_eq!(sources, sorted);
}

#[test]
fn test_destination_inside_root_is_not_walked() {
    let ws = Workspace::new();
    ws.image("library/photo.png", 11);

    let mut config = config(&ws, &["library"], images_rule());
    config.dest = ws.path("library/sorted");
    Pipeline::new(config.clone()).run().unwrap();
    let second = Pipeline::new(config).run().unwrap();

    assert_eq!(second.stats.files_discovered, 1);
    assert!(!ws.path("library/sorted/sorted").exists());
}

#[test]
fn test_bucket_by_rule_layout() {
    let ws = Workspace::new();
    ws.image("src/x/photo.png", 12);

    let mut config = config(&ws, &["src"], images_rule());
    config.bucket_by_rule = true;
    Pipeline::new(config).run().unwrap();

    assert!(ws.path("out/All images/x/photo.png").is_file());
}

#[test]
fn test_extension_only_detection() {
    let ws = Workspace::new();
    ws.write("src/fake.jpg", b"plain text pretending");

    let mut config = config(&ws, &["src"], images_rule());
    config.content_sniffing = false;
    let report = Pipeline::new(config).run().unwrap();
    let rows = audit_rows(&report);

    assert_eq!(rows[0]["mime"], "image/jpeg");
    assert_eq!(rows[0]["rule"], "All images");
}
