use photodedup::actions::{DeleteError, FileRemover};
use photodedup::duplicates::{DuplicateEngine, EngineConfig, ErrorStage, ExecutionMode};
use photodedup::scanner::FileRecord;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

#[derive(Default)]
struct RecordingRemover {
    removed: Mutex<Vec<PathBuf>>,
}

impl FileRemover for RecordingRemover {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))?;
        self.removed.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn scanned(path: &Path) -> FileRecord {
    let metadata = fs::metadata(path).unwrap();
    FileRecord::new(path.to_path_buf(), metadata.len(), metadata.modified().unwrap())
}

fn apply_engine(root: &Path, remover: Arc<RecordingRemover>) -> DuplicateEngine {
    DuplicateEngine::new(
        EngineConfig::new(root)
            .with_min_file_size(1)
            .with_mode(ExecutionMode::Apply)
            .with_remover(remover),
    )
    .unwrap()
}

#[test]
fn test_apply_removes_every_redundant_copy() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("DSC_0100.jpg");
    write(&original, b"raw bytes");
    for n in 1..=3 {
        write(&dir.path().join(format!("DSC_0100_{n}.jpg")), b"raw bytes");
    }

    let remover = Arc::new(RecordingRemover::default());
    let report = apply_engine(dir.path(), remover.clone()).run().unwrap();

    assert_eq!(report.duplicates_resolved, 3);
    assert_eq!(report.bytes_reclaimable_or_reclaimed, 27);
    assert_eq!(remover.removed.lock().unwrap().len(), 3);
    assert!(original.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_missing_original_blocks_removal() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("a.jpg");
    let copy = dir.path().join("a_1.jpg");
    write(&original, b"content");
    write(&copy, b"content");

    let records = vec![scanned(&original), scanned(&copy)];
    fs::remove_file(&original).unwrap();

    let remover = Arc::new(RecordingRemover::default());
    let engine = DuplicateEngine::new(
        EngineConfig::new(dir.path())
            .with_confidence_threshold(0.5)
            .with_mode(ExecutionMode::Apply)
            .with_remover(remover.clone()),
    )
    .unwrap();
    let report = engine.resolve(records).unwrap();

    assert_eq!(report.groups_accepted, 1);
    assert_eq!(report.duplicates_resolved, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, ErrorStage::Action);
    assert!(remover.removed.lock().unwrap().is_empty());
    assert!(copy.exists());
}

#[test]
fn test_modified_copy_is_kept() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("b.jpg");
    let copy = dir.path().join("b_1.jpg");
    write(&original, b"content");
    write(&copy, b"content");

    let stale = FileRecord::new(
        copy.clone(),
        7,
        fs::metadata(&copy).unwrap().modified().unwrap() + Duration::from_secs(3600),
    );
    let records = vec![scanned(&original), stale];

    let remover = Arc::new(RecordingRemover::default());
    let engine = DuplicateEngine::new(
        EngineConfig::new(dir.path())
            .with_confidence_threshold(0.5)
            .with_mode(ExecutionMode::Apply)
            .with_remover(remover.clone()),
    )
    .unwrap();
    let report = engine.resolve(records).unwrap();

    assert_eq!(report.groups_found, 1);
    assert_eq!(report.groups[0].failed, vec![copy.clone()]);
    assert!(copy.exists());
    assert!(report.errors[0].message.contains("modified"));
}

#[test]
fn test_simulate_then_apply_agree() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("x.heic"), b"same");
    write(&dir.path().join("x_1.heic"), b"same");
    write(&dir.path().join("y.heic"), b"other!");
    write(&dir.path().join("y (1).heic"), b"other!");

    let simulated = DuplicateEngine::new(EngineConfig::new(dir.path()).with_min_file_size(1))
        .unwrap()
        .run()
        .unwrap();
    let remover = Arc::new(RecordingRemover::default());
    let applied = apply_engine(dir.path(), remover.clone()).run().unwrap();

    assert_eq!(simulated.groups_found, applied.groups_found);
    assert_eq!(simulated.duplicates_resolved, applied.duplicates_resolved);
    assert_eq!(
        simulated.bytes_reclaimable_or_reclaimed,
        applied.bytes_reclaimable_or_reclaimed
    );
    let mut removed = remover.removed.lock().unwrap().clone();
    removed.sort();
    let mut projected: Vec<PathBuf> = simulated
        .groups
        .iter()
        .flat_map(|g| g.redundant.iter().cloned())
        .collect();
    projected.sort();
    assert_eq!(removed, projected);
}
