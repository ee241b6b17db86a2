//! Scanner module for directory traversal, link filtering and fingerprinting.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk over a bounded worker pool
//! - Derived-key extraction from file names
//! - Hard-link detection via (device, inode) storage identity
//! - Progressive content fingerprinting (quick sample, then full content)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal producing [`FileRecord`]s
//! - [`names`]: Derived-key and sequence number parsing
//! - [`hardlink`]: Storage identity tracking and link removal
//! - [`hasher`]: Quick and full fingerprints, group verification
//!
//! # Example
//!
//! ```no_run
//! use photodedup::scanner::{ScanConfig, Walker};
//! use std::path::Path;
//!
//! let config = ScanConfig {
//!     min_file_size: 1024,
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/photos"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(record) => println!("{}: {} bytes", record.path.display(), record.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod names;
pub mod walker;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

pub use hardlink::{HardlinkFilter, HardlinkStats, StorageId};
pub use hasher::{Fingerprint, GroupVerification, HashAlgorithm, Hasher};
pub use names::{parse_file_name, NameCache, ParsedName};
pub use walker::Walker;

/// Default minimum file size considered for deduplication.
pub const DEFAULT_MIN_FILE_SIZE: u64 = 1024;

/// Metadata for a discovered regular file.
///
/// Records are produced once by the walker and treated as immutable
/// afterwards. Everything later stages need is captured here so that
/// grouping and scoring never touch the filesystem again.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Creation (birth) time, when the platform reports one
    pub created: Option<SystemTime>,
    /// Last modification time
    pub modified: SystemTime,
    /// Logical name with any trailing duplicate marker removed
    pub derived_key: Arc<str>,
    /// Duplicate marker number, 0 when the name carries none
    pub sequence: u64,
    /// Storage identity, when the platform exposes a usable one
    pub storage_id: Option<StorageId>,
}

impl FileRecord {
    /// Create a record, deriving the key and sequence from the file name.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        let parsed = path
            .file_name()
            .map(|name| parse_file_name(&name.to_string_lossy()))
            .unwrap_or_default();

        Self::with_parsed_name(path, size, modified, parsed)
    }

    /// Create a record from an already parsed name.
    #[must_use]
    pub fn with_parsed_name(
        path: PathBuf,
        size: u64,
        modified: SystemTime,
        parsed: ParsedName,
    ) -> Self {
        Self {
            path,
            size,
            created: None,
            modified,
            derived_key: parsed.derived_key,
            sequence: parsed.sequence,
            storage_id: None,
        }
    }

    /// Set the creation time.
    #[must_use]
    pub fn with_created(mut self, created: Option<SystemTime>) -> Self {
        self.created = created;
        self
    }

    /// Set the storage identity.
    #[must_use]
    pub fn with_storage_id(mut self, storage_id: Option<StorageId>) -> Self {
        self.storage_id = storage_id;
        self
    }

    /// Timestamp used for keeper selection and scoring.
    ///
    /// Creation time when known, modification time otherwise.
    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        self.created.unwrap_or(self.modified)
    }

    /// File name component for display.
    #[must_use]
    pub fn file_name(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map_or(Cow::Borrowed(""), |name| name.to_string_lossy())
    }

    /// Ordering that puts the file to keep first.
    ///
    /// Earliest timestamp wins, ties broken by the lexicographically
    /// smallest path.
    #[must_use]
    pub fn keeper_order(a: &Self, b: &Self) -> Ordering {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.path.cmp(&b.path))
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Files strictly smaller than this are skipped.
    pub min_file_size: u64,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    /// These are applied in addition to any .gitignore at the root.
    pub ignore_patterns: Vec<String>,

    /// Number of threads used for traversal.
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            workers: default_workers(),
        }
    }
}

/// Default worker count: four per CPU, capped at 64.
#[must_use]
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    (cpus * 4).min(64)
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The traversal itself failed.
    #[error("Walk error for {path}: {message}")]
    Walk {
        /// Path where the error occurred, if jwalk reported one
        path: PathBuf,
        /// Description from the walker
        message: String,
    },
}

impl ScanError {
    /// Classify an I/O error against the path it occurred on.
    #[must_use]
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io { path, source: err },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(path) | Self::NotFound(path) => path,
            Self::Io { path, .. } | Self::Walk { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished before it could be read.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file no longer has the size recorded during the scan.
    #[error("Size changed for {path}: expected {expected} bytes, found {actual}")]
    SizeChanged {
        /// Path of the file
        path: PathBuf,
        /// Size recorded at scan time
        expected: u64,
        /// Size observed while hashing
        actual: u64,
    },

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error against the path it occurred on.
    #[must_use]
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io { path, source: err },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(path) | Self::PermissionDenied(path) | Self::Interrupted(path) => path,
            Self::SizeChanged { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
