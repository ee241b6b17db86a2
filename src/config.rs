//! Layered application configuration.
//!
//! Settings merge in this order, later layers winning:
//!
//! 1. [`Config::default`]
//! 2. A TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `PHOTODEDUP_*` environment variables
//! 4. Command-line flags ([`Config::apply_scan_args`])
//!
//! The merged value is turned into an [`EngineConfig`] for a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::DeleteMethod;
use crate::cli::ScanArgs;
use crate::duplicates::confidence::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TIMESTAMP_TOLERANCE};
use crate::duplicates::{EngineConfig, ExecutionMode};
use crate::error::ConfigError;
use crate::scanner::hasher::{DEFAULT_MMAP_THRESHOLD, DEFAULT_SAMPLE_SIZE};
use crate::scanner::{default_workers, HashAlgorithm, DEFAULT_MIN_FILE_SIZE};

/// Prefix for environment overrides, e.g. `PHOTODEDUP_MIN_FILE_SIZE`.
pub const ENV_PREFIX: &str = "PHOTODEDUP_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files smaller than this many bytes are ignored.
    pub min_file_size: u64,
    /// Groups scoring at least this skip content verification; 1.0 always verifies.
    pub confidence_threshold: f64,
    /// Window in seconds for the timestamp confidence signal.
    pub timestamp_tolerance_secs: u64,
    /// Worker threads; unset means CPU count x 4, capped at 64.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Most files content verification may read; unset means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_verify_files: Option<usize>,
    /// Fingerprint digest.
    pub hash_algorithm: HashAlgorithm,
    /// Bytes per quick-fingerprint sample.
    pub sample_size: usize,
    /// Allow memory mapping for large files.
    pub use_mmap: bool,
    /// Size at or above which memory mapping is used.
    pub mmap_threshold: u64,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Gitignore-style patterns to exclude.
    pub ignore_patterns: Vec<String>,
    /// How apply mode removes redundant copies.
    pub delete_method: DeleteMethod,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE.as_secs(),
            workers: None,
            max_verify_files: None,
            hash_algorithm: HashAlgorithm::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            delete_method: DeleteMethod::default(),
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist. Without one, the platform default
    /// file is used when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigFileNotFound`] for a missing explicit
    /// file and [`ConfigError::Load`] when a layer cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = &file {
            log::debug!("Loading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        Self::extract(&figment)
    }

    /// Extract a configuration from an assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a value has the wrong type.
    pub fn extract(figment: &Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Platform config file path, e.g. `~/.config/photodedup/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "photodedup", "photodedup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Overlay the flags given to `scan`.
    pub fn apply_scan_args(&mut self, args: &ScanArgs) {
        if let Some(size) = args.min_size {
            self.min_file_size = size;
        }
        if let Some(threshold) = args.confidence {
            self.confidence_threshold = threshold;
        }
        if let Some(secs) = args.timestamp_tolerance {
            self.timestamp_tolerance_secs = secs;
        }
        if let Some(workers) = args.workers {
            self.workers = Some(workers);
        }
        if let Some(limit) = args.max_verify {
            self.max_verify_files = Some(limit);
        }
        if let Some(algorithm) = args.hash {
            self.hash_algorithm = algorithm;
        }
        if let Some(threshold) = args.mmap_threshold {
            self.mmap_threshold = threshold;
        }
        if args.no_mmap {
            self.use_mmap = false;
        }
        if args.skip_hidden {
            self.skip_hidden = true;
        }
        if args.trash {
            self.delete_method = DeleteMethod::Trash;
        }
        self.ignore_patterns
            .extend(args.ignore_patterns.iter().cloned());
    }

    /// Build and validate the engine configuration for `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for out-of-range settings.
    pub fn engine_config(
        &self,
        root: impl Into<PathBuf>,
        mode: ExecutionMode,
    ) -> Result<EngineConfig, ConfigError> {
        let config = EngineConfig::new(root)
            .with_min_file_size(self.min_file_size)
            .with_confidence_threshold(self.confidence_threshold)
            .with_timestamp_tolerance(Duration::from_secs(self.timestamp_tolerance_secs))
            .with_workers(self.workers.unwrap_or_else(default_workers))
            .with_mode(mode)
            .with_max_verify_files(self.max_verify_files)
            .with_hash_algorithm(self.hash_algorithm)
            .with_sample_size(self.sample_size)
            .with_mmap(self.use_mmap, self.mmap_threshold)
            .with_skip_hidden(self.skip_hidden)
            .with_ignore_patterns(self.ignore_patterns.clone())
            .with_remover(self.delete_method.remover());
        config.validate()?;
        Ok(config)
    }
}
