use photodedup::duplicates::{DuplicateEngine, EngineConfig};
use photodedup::error::ExitCode;
use photodedup::output::{CsvOutput, JsonOutput};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use unicode_normalization::UnicodeNormalization;

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn run(root: &Path) -> photodedup::duplicates::RunReport {
    DuplicateEngine::new(EngineConfig::new(root).with_min_file_size(1))
        .unwrap()
        .run()
        .unwrap()
}

#[test]
fn test_paths_with_quotes_and_commas() {
    if cfg!(windows) {
        return;
    }
    let dir = tempdir().unwrap();
    write(&dir.path().join("say \"cheese\", please.jpg"), b"smile");
    write(&dir.path().join("say \"cheese\", please_1.jpg"), b"smile");

    let report = run(dir.path());
    assert_eq!(report.groups_found, 1);

    let json = JsonOutput::new(&report, ExitCode::Success)
        .to_json_pretty()
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["groups"][0]["original_path"]
        .as_str()
        .unwrap()
        .ends_with("say \"cheese\", please.jpg"));

    let csv = CsvOutput::new(&report.groups).to_string().unwrap();
    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    assert_eq!(reader.records().count(), 2);
}

#[test]
fn test_decomposed_and_composed_names_share_key() {
    if cfg!(target_os = "macos") {
        // The filesystem normalizes names itself.
        return;
    }
    let dir = tempdir().unwrap();
    let composed: String = "café.jpg".nfc().collect();
    let decomposed: String = "café_1.jpg".nfd().collect();

    write(&dir.path().join(&composed), b"latte art");
    write(&dir.path().join(&decomposed), b"latte art");

    let report = run(dir.path());
    assert_eq!(report.candidate_groups, 1);
    assert_eq!(report.groups_found, 1);
    assert_eq!(report.groups[0].derived_key, composed);
}

#[test]
fn test_deep_directory_tree() {
    let dir = tempdir().unwrap();
    let mut current = dir.path().to_path_buf();
    for i in 0..6 {
        current = current.join(format!("{}_{}", i, "a".repeat(50)));
        if fs::create_dir(&current).is_err() {
            return;
        }
    }

    write(&current.join("deep.jpg"), b"far down");
    write(&dir.path().join("deep_1.jpg"), b"far down");

    let report = run(dir.path());
    assert_eq!(report.groups_found, 1);
}

#[test]
fn test_files_without_extension() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("README"), b"notes");
    write(&dir.path().join("README (1)"), b"notes");

    let report = run(dir.path());
    assert_eq!(report.groups_found, 1);
    assert!(report.groups[0].original.ends_with("README"));
}
