//! Structured error handling and exit codes.

use std::path::PathBuf;

use serde::Serialize;

/// Exit codes for the photodedup binary.
///
/// - 0: Success (completed normally, duplicates found)
/// - 1: General error (invalid configuration or unexpected failure)
/// - 2: No duplicates found (completed normally)
/// - 3: Partial success (completed, but some files could not be processed)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: Run completed and duplicates were found.
    Success = 0,
    /// General error: The run could not start or failed unexpectedly.
    GeneralError = 1,
    /// No duplicates: Run completed but found nothing to resolve.
    NoDuplicates = 2,
    /// Partial success: Run completed with recorded per-file errors.
    PartialSuccess = 3,
    /// Interrupted: Run stopped early at the user's request.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "PD000",
            Self::GeneralError => "PD001",
            Self::NoDuplicates => "PD002",
            Self::PartialSuccess => "PD003",
            Self::Interrupted => "PD130",
        }
    }
}

/// Structured error information for `--json-errors` output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "PD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

/// Invalid configuration. Raised before any file is touched.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The root path does not exist.
    #[error("Root path not found: {0}")]
    RootNotFound(PathBuf),

    /// The root path exists but is not a directory.
    #[error("Root path is not a directory: {0}")]
    RootNotADirectory(PathBuf),

    /// The root path could not be resolved.
    #[error("Cannot access root path {path}: {source}")]
    RootInaccessible {
        /// Root as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Confidence threshold outside `0.0..=1.0` (or NaN).
    #[error("Confidence threshold must be between 0.0 and 1.0, got {0}")]
    InvalidThreshold(f64),

    /// Worker count of zero.
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    /// Quick-stage sample size of zero or above the supported maximum.
    #[error("Sample size must be between 1 byte and 64 MiB, got {0}")]
    InvalidSampleSize(usize),

    /// A config file named explicitly does not exist.
    #[error("Config file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    /// Layered configuration failed to load or parse.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}
