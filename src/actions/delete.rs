//! Removal of redundant copies.
//!
//! # Overview
//!
//! Removal goes through the [`FileRemover`] trait so that the engine never
//! calls into the filesystem directly:
//! - [`PermanentRemover`] unlinks the file (default)
//! - [`TrashRemover`] moves it to the system trash (recoverable)
//!
//! # Safety
//!
//! Before a copy is removed, [`remove_redundant`] checks that its size and
//! modification time still match what the scan recorded, and the engine
//! checks that the original it is a copy of still exists. Any mismatch
//! skips the copy and reports an error instead.
//!
//! # Example
//!
//! ```no_run
//! use photodedup::actions::delete::{remove_redundant, DeleteMethod};
//! use photodedup::scanner::FileRecord;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let copy = FileRecord::new(PathBuf::from("/photos/IMG_001_1.jpg"), 1024, SystemTime::now());
//! let remover = DeleteMethod::Trash.remover();
//! match remove_redundant(&copy, remover.as_ref()) {
//!     Ok(bytes) => println!("Freed {} bytes", bytes),
//!     Err(e) => eprintln!("Failed: {}", e),
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scanner::FileRecord;

/// Error type for removal operations.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File changed since it was scanned.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The original a copy belongs to has gone missing.
    #[error("original {original} no longer exists, keeping {redundant}")]
    OriginalMissing {
        /// Expected original
        original: PathBuf,
        /// Copy that was not removed
        redundant: PathBuf,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// Path that could not be trashed
        path: PathBuf,
        /// Message from the platform trash
        message: String,
    },

    /// The file chosen as original was also selected for removal.
    #[error("refusing to remove {0}: it is the original being kept")]
    OriginalSelected(PathBuf),

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Classify an I/O error against the path it occurred on.
    #[must_use]
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::Modified(p)
            | Self::OriginalSelected(p)
            | Self::TrashFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::OriginalMissing { redundant, .. } => Some(redundant),
        }
    }
}

/// How apply mode disposes of redundant copies.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMethod {
    /// Unlink the file
    #[default]
    Permanent,
    /// Move the file to the system trash
    Trash,
}

impl DeleteMethod {
    /// Remover implementing this method.
    #[must_use]
    pub fn remover(self) -> Arc<dyn FileRemover> {
        match self {
            Self::Permanent => Arc::new(PermanentRemover),
            Self::Trash => Arc::new(TrashRemover),
        }
    }
}

/// Capability to remove a file.
///
/// The engine only ever removes files through this trait.
pub trait FileRemover: Send + Sync {
    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteError`] describing why the file is still there.
    fn remove(&self, path: &Path) -> Result<(), DeleteError>;

    /// Short name for logs and reports.
    fn name(&self) -> &'static str;
}

/// Unlinks files with [`std::fs::remove_file`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PermanentRemover;

impl FileRemover for PermanentRemover {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        fs::remove_file(path).map_err(|e| DeleteError::from_io(path, e))
    }

    fn name(&self) -> &'static str {
        "permanent"
    }
}

/// Moves files to the platform trash via the `trash` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrashRemover;

impl FileRemover for TrashRemover {
    fn remove(&self, path: &Path) -> Result<(), DeleteError> {
        trash::delete(path).map_err(|e| DeleteError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "trash"
    }
}

/// Size and modification time of a file at one point in time.
///
/// Used to detect changes between scan and removal (TOCTOU protection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<SystemTime>,
}

impl FileSnapshot {
    /// Snapshot the file as it is now. Symbolic links are not followed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or unreadable, and
    /// [`DeleteError::Modified`] if the path is no longer a regular file.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
        if !metadata.is_file() {
            return Err(DeleteError::Modified(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }

    /// Snapshot as recorded during the scan.
    #[must_use]
    pub fn of_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size,
            modified: Some(record.modified),
        }
    }

    /// Check that the file on disk still matches this snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`DeleteError::Modified`] if size or modification time changed.
    pub fn verify(&self) -> Result<(), DeleteError> {
        let current = Self::capture(&self.path)?;
        let mtime_changed = matches!(
            (self.modified, current.modified),
            (Some(expected), Some(actual)) if expected != actual
        );
        if current.size != self.size || mtime_changed {
            log::warn!(
                "File changed since scan: {} ({} -> {} bytes)",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(DeleteError::Modified(self.path.clone()));
        }
        Ok(())
    }
}

/// Check that the original of a verdict is still in place.
///
/// # Errors
///
/// Returns [`DeleteError::OriginalMissing`] naming `redundant` when the
/// original is gone or no longer a regular file.
pub fn ensure_original_present(original: &FileRecord, redundant: &Path) -> Result<(), DeleteError> {
    match fs::symlink_metadata(&original.path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        _ => Err(DeleteError::OriginalMissing {
            original: original.path.clone(),
            redundant: redundant.to_path_buf(),
        }),
    }
}

/// Remove one redundant copy after re-checking it against its record.
///
/// Returns the number of bytes freed.
///
/// # Errors
///
/// Returns [`DeleteError::Modified`] if the file changed since the scan,
/// or whatever the remover reports.
pub fn remove_redundant(record: &FileRecord, remover: &dyn FileRemover) -> Result<u64, DeleteError> {
    FileSnapshot::of_record(record).verify()?;
    remover.remove(&record.path)?;
    log::info!(
        "Removed ({}): {} ({} bytes)",
        remover.name(),
        record.path.display(),
        record.size
    );
    Ok(record.size)
}

/// Check that the original is not among the paths selected for removal.
///
/// # Errors
///
/// Returns [`DeleteError::OriginalSelected`] if it is.
pub fn validate_keeps_original(original: &Path, selected: &[PathBuf]) -> Result<(), DeleteError> {
    if selected.iter().any(|path| path == original) {
        return Err(DeleteError::OriginalSelected(original.to_path_buf()));
    }
    Ok(())
}
