use photodedup::duplicates::{DuplicateEngine, EngineConfig, ExecutionMode};
use photodedup::scanner::HardlinkFilter;
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

fn engine(root: &std::path::Path, mode: ExecutionMode) -> DuplicateEngine {
    DuplicateEngine::new(
        EngineConfig::new(root)
            .with_min_file_size(1)
            .with_workers(2)
            .with_mode(mode),
    )
    .unwrap()
}

#[test]
fn test_hardlinks_not_counted_as_duplicates() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("IMG_100.jpg");
    let link = dir.path().join("IMG_100_1.jpg");

    File::create(&original)
        .unwrap()
        .write_all(b"identical content")
        .unwrap();
    if let Err(e) = fs::hard_link(&original, &link) {
        eprintln!("Skipping hardlink test: failed to create hardlink: {}", e);
        return;
    }

    let report = engine(dir.path(), ExecutionMode::Apply).run().unwrap();

    if HardlinkFilter::is_supported() {
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.hardlinks_removed, 1);
        assert_eq!(report.groups_found, 0);
        assert!(original.exists() && link.exists());
    } else {
        assert_eq!(report.groups_found, 1);
    }
}

#[test]
fn test_hardlink_alongside_real_copy() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("clip.mp4");
    let link = dir.path().join("clip (1).mp4");
    let copy = dir.path().join("clip_2.mp4");

    File::create(&original).unwrap().write_all(b"frames").unwrap();
    File::create(&copy).unwrap().write_all(b"frames").unwrap();
    if fs::hard_link(&original, &link).is_err() {
        return;
    }
    if !HardlinkFilter::is_supported() {
        return;
    }

    let report = engine(dir.path(), ExecutionMode::Simulate).run().unwrap();
    assert_eq!(report.hardlinks_removed, 1);
    assert_eq!(report.groups_found, 1);
    assert_eq!(report.groups[0].redundant.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_symlinks_not_followed() {
    let dir = tempdir().unwrap();
    let original = dir.path().join("pic.jpg");
    let symlink = dir.path().join("pic_1.jpg");

    File::create(&original).unwrap().write_all(b"content").unwrap();
    std::os::unix::fs::symlink(&original, &symlink).unwrap();

    let report = engine(dir.path(), ExecutionMode::Apply).run().unwrap();
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.groups_found, 0);
    assert!(symlink.exists());
}
