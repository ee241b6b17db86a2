use clap::Parser;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use photodedup::actions::DeleteMethod;
use photodedup::cli::{Cli, Commands};
use photodedup::config::Config;
use photodedup::duplicates::ExecutionMode;
use photodedup::error::ConfigError;
use photodedup::scanner::HashAlgorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_from_env() {
    std::env::set_var("PHOTODEDUP_TEST_MIN_FILE_SIZE", "4096");
    std::env::set_var("PHOTODEDUP_TEST_HASH_ALGORITHM", "blake3");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("PHOTODEDUP_TEST_"));
    let config = Config::extract(&figment).unwrap();

    assert_eq!(config.min_file_size, 4096);
    assert_eq!(config.hash_algorithm, HashAlgorithm::Blake3);

    std::env::remove_var("PHOTODEDUP_TEST_MIN_FILE_SIZE");
    std::env::remove_var("PHOTODEDUP_TEST_HASH_ALGORITHM");
}

#[test]
fn test_env_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "confidence_threshold = 0.5\nskip_hidden = true\n").unwrap();
    std::env::set_var("PHOTODEDUP_LAYER_CONFIDENCE_THRESHOLD", "0.8");

    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("PHOTODEDUP_LAYER_"));
    let config = Config::extract(&figment).unwrap();

    assert_eq!(config.confidence_threshold, 0.8);
    assert!(config.skip_hidden);

    std::env::remove_var("PHOTODEDUP_LAYER_CONFIDENCE_THRESHOLD");
}

#[test]
fn test_cli_overrides_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "min_file_size = 10\nignore_patterns = [\"*.tmp\"]\nuse_mmap = true\n",
    )
    .unwrap();

    let mut config = Config::load(Some(&path)).unwrap();
    let cli = Cli::try_parse_from([
        "photodedup",
        "scan",
        "/photos",
        "--min-size",
        "2KiB",
        "--no-mmap",
        "--apply",
        "--trash",
        "--ignore",
        "thumbs/",
    ])
    .unwrap();
    let Commands::Scan(args) = cli.command else {
        panic!("Expected Scan command");
    };
    config.apply_scan_args(&args);

    assert_eq!(config.min_file_size, 2048);
    assert!(!config.use_mmap);
    assert_eq!(config.delete_method, DeleteMethod::Trash);
    assert_eq!(config.ignore_patterns, vec!["*.tmp", "thumbs/"]);

    let engine = config.engine_config("/photos", ExecutionMode::Apply).unwrap();
    assert_eq!(engine.remover.name(), "trash");
}

#[test]
fn test_invalid_threshold_from_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "confidence_threshold = 1.5\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(matches!(
        config.engine_config("/photos", ExecutionMode::Simulate),
        Err(ConfigError::InvalidThreshold(_))
    ));
}

#[test]
fn test_unparseable_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "min_file_size = [").unwrap();

    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Load(_))
    ));
}
