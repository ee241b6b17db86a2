use photodedup::duplicates::{DuplicateEngine, EngineConfig, ErrorStage};
use photodedup::scanner::FileRecord;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;
use tempfile::tempdir;

#[test]
fn test_missing_files_recorded_and_skipped() {
    let dir = tempdir().unwrap();
    let engine = DuplicateEngine::new(EngineConfig::new(dir.path())).unwrap();

    let records = vec![
        FileRecord::new(PathBuf::from("/nonexistent/x.jpg"), 100, SystemTime::now()),
        FileRecord::new(PathBuf::from("/nonexistent/x_1.jpg"), 100, SystemTime::now()),
    ];
    let report = engine.resolve(records).unwrap();

    assert_eq!(report.candidate_groups, 1);
    assert_eq!(report.groups_found, 0);
    assert_eq!(report.errors.len(), 2);
    assert!(report.errors.iter().all(|e| e.stage == ErrorStage::Hash));
}

#[test]
fn test_one_vanished_member_does_not_block_the_rest() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("party.jpg");
    let b = dir.path().join("party_1.jpg");
    let c = dir.path().join("party_2.jpg");
    for path in [&a, &b] {
        File::create(path).unwrap().write_all(b"confetti").unwrap();
    }

    let engine = DuplicateEngine::new(EngineConfig::new(dir.path())).unwrap();
    let records = vec![
        FileRecord::new(a.clone(), 8, SystemTime::now()),
        FileRecord::new(b, 8, SystemTime::now()),
        FileRecord::new(c.clone(), 8, SystemTime::now()),
    ];
    let report = engine.resolve(records).unwrap();

    assert_eq!(report.groups_found, 1);
    assert_eq!(report.groups[0].original, a);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path.as_ref(), Some(&c));
}

#[test]
fn test_size_change_since_scan_excludes_file() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("grow.jpg");
    let b = dir.path().join("grow_1.jpg");
    File::create(&a).unwrap().write_all(b"12345").unwrap();
    File::create(&b).unwrap().write_all(b"1234567890").unwrap();

    let engine = DuplicateEngine::new(EngineConfig::new(dir.path())).unwrap();
    let records = vec![
        FileRecord::new(a, 5, SystemTime::now()),
        FileRecord::new(b, 5, SystemTime::now()),
    ];
    let report = engine.resolve(records).unwrap();

    assert_eq!(report.groups_found, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("changed"));
}
