use photodedup::duplicates::{DuplicateEngine, EngineConfig, Resolution};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn engine(root: &Path) -> DuplicateEngine {
    DuplicateEngine::new(EngineConfig::new(root).with_min_file_size(1).with_workers(2)).unwrap()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let report = engine(dir.path()).run().unwrap();

    assert!(report.groups.is_empty());
    assert_eq!(report.files_scanned, 0);
    assert_eq!(report.candidate_groups, 0);
    assert!(!report.interrupted);
}

#[test]
fn test_identical_content_different_names_not_grouped() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.jpg"), b"duplicate");
    write(&dir.path().join("b.jpg"), b"duplicate");

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.files_scanned, 2);
    assert_eq!(report.candidate_groups, 0);
    assert_eq!(report.groups_found, 0);
}

#[test]
fn test_copy_suffix_variants_grouped() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("beach.jpg"), b"sand and sea");
    write(&dir.path().join("beach_1.jpg"), b"sand and sea");
    write(&dir.path().join("beach (2).jpg"), b"sand and sea");

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.groups_found, 1);

    let group = &report.groups[0];
    assert_eq!(group.redundant.len(), 2);
    assert_eq!(group.resolution, Resolution::ContentVerified);
    assert_eq!(report.duplicates_resolved, 2);
    assert_eq!(report.bytes_reclaimable_or_reclaimed, 24);
}

#[test]
fn test_nested_directories_share_groups() {
    let dir = tempdir().unwrap();
    let sub = dir.path().join("2023").join("summer");
    fs::create_dir_all(&sub).unwrap();

    write(&dir.path().join("IMG_0042.jpg"), b"pixels");
    write(&sub.join("IMG_0042_1.jpg"), b"pixels");

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.groups_found, 1);
    assert_eq!(report.files_scanned, 2);
}

#[test]
fn test_multiple_groups_sorted_by_original() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("zebra.jpg"), b"stripes!");
    write(&dir.path().join("zebra_1.jpg"), b"stripes!");
    write(&dir.path().join("apple.jpg"), b"red");
    write(&dir.path().join("apple_1.jpg"), b"red");
    write(&dir.path().join("apple_2.jpg"), b"red");

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.groups_found, 2);
    assert!(report.groups[0].original.ends_with("apple.jpg"));
    assert!(report.groups[1].original.ends_with("zebra.jpg"));
    assert_eq!(report.duplicates_resolved, 3);
}

#[test]
fn test_same_name_different_content_split() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("scan.png"), b"AAAA");
    write(&dir.path().join("scan_1.png"), b"AAAA");
    write(&dir.path().join("scan_2.png"), b"BBBB");
    write(&dir.path().join("scan_3.png"), b"BBBB");

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.candidate_groups, 1);
    assert_eq!(report.groups_found, 2);
    assert_eq!(report.duplicates_resolved, 2);
}

#[test]
fn test_ignore_patterns_exclude_files() {
    let dir = tempdir().unwrap();
    let thumbs = dir.path().join("thumbs");
    fs::create_dir(&thumbs).unwrap();
    write(&dir.path().join("a.jpg"), b"data");
    write(&thumbs.join("a_1.jpg"), b"data");

    let config = EngineConfig::new(dir.path())
        .with_min_file_size(1)
        .with_ignore_patterns(vec!["thumbs/".to_string()]);
    let report = DuplicateEngine::new(config).unwrap().run().unwrap();

    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.groups_found, 0);
}

#[test]
fn test_bytes_hashed_reported() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("v.mov"), &[9u8; 10_000]);
    write(&dir.path().join("v_1.mov"), &[9u8; 10_000]);

    let report = engine(dir.path()).run().unwrap();
    assert_eq!(report.groups_found, 1);
    assert!(report.bytes_hashed >= 20_000);
}
