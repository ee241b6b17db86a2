//! End-to-end exit codes and error reporting through `run_app`.

use clap::Parser;
use photodedup::cli::Cli;
use photodedup::error::{ConfigError, ExitCode, StructuredError};
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

fn scan(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["photodedup", "-q", "scan"];
    argv.extend_from_slice(args);
    photodedup::run_app(Cli::try_parse_from(argv).unwrap())
}

fn write(path: &std::path::Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

#[test]
fn test_exit_code_no_duplicates() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("unique.jpg"), b"unique");

    let code = scan(&[dir.path().to_str().unwrap(), "--min-size", "1", "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_exit_code_success_with_duplicates() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.jpg"), b"dup");
    write(&dir.path().join("a_1.jpg"), b"dup");

    let code = scan(&[dir.path().to_str().unwrap(), "--min-size", "1", "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a_1.jpg").exists());
}

#[test]
fn test_default_min_size_skips_small_files() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.jpg"), b"dup");
    write(&dir.path().join("a_1.jpg"), b"dup");

    let code = scan(&[dir.path().to_str().unwrap(), "--output", "csv"]).unwrap();
    assert_eq!(code, ExitCode::NoDuplicates);
}

#[test]
fn test_apply_flag_removes() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.jpg"), b"dup");
    write(&dir.path().join("a_1.jpg"), b"dup");

    let code = scan(&[
        dir.path().to_str().unwrap(),
        "--min-size",
        "1",
        "--apply",
        "--output",
        "json",
    ])
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(dir.path().join("a.jpg").exists());
    assert!(!dir.path().join("a_1.jpg").exists());
}

#[test]
fn test_missing_root_is_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");

    let err = scan(&[missing.to_str().unwrap()]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::RootNotFound(_))
    ));
}

#[test]
fn test_invalid_threshold_is_error() {
    let dir = tempdir().unwrap();
    let err = scan(&[dir.path().to_str().unwrap(), "--confidence", "2.0"]).unwrap_err();

    let structured = StructuredError::new(&err, ExitCode::GeneralError);
    assert_eq!(structured.code, "PD001");
    assert!(structured.message.contains("between 0.0 and 1.0"));
}

#[test]
fn test_zero_workers_is_error() {
    let dir = tempdir().unwrap();
    let err = scan(&[dir.path().to_str().unwrap(), "--workers", "0"]).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
}

#[test]
fn test_missing_config_file_is_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.toml");
    let cli = Cli::try_parse_from([
        "photodedup",
        "-q",
        "--config",
        missing.to_str().unwrap(),
        "scan",
        dir.path().to_str().unwrap(),
    ])
    .unwrap();

    let err = photodedup::run_app(cli).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::ConfigFileNotFound(_))
    ));
}

#[cfg(unix)]
#[test]
fn test_exit_code_partial_success_on_unreadable_file() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(&dir.path().join("a.jpg"), b"dup");
    write(&dir.path().join("a_1.jpg"), b"dup");
    let locked = dir.path().join("a_2.jpg");
    write(&locked, b"dup");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if File::open(&locked).is_ok() {
        // Running with privileges that ignore file modes.
        return;
    }

    let code = scan(&[dir.path().to_str().unwrap(), "--min-size", "1", "--output", "json"]).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
}

#[cfg(unix)]
#[test]
fn test_exit_code_partial_success_on_unreadable_directory() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let album = dir.path().join("album");
    let locked = dir.path().join("locked");
    fs::create_dir(&album).unwrap();
    fs::create_dir(&locked).unwrap();
    write(&album.join("a.jpg"), b"dup");
    write(&album.join("a_1.jpg"), b"dup");
    write(&locked.join("b.jpg"), b"dup");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = scan(&[dir.path().to_str().unwrap(), "--min-size", "1", "--output", "json"]);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(result.unwrap(), ExitCode::PartialSuccess);
    assert!(album.join("a_1.jpg").exists());
}
