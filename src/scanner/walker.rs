//! Directory walker built on jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] traverses a tree and yields one [`FileRecord`] per regular
//! file at or above the configured minimum size. Directory listing,
//! metadata reads and name parsing all happen inside jwalk's
//! `process_read_dir` callback, so they run on the walker's own rayon
//! pool of `workers` threads.
//!
//! # Features
//!
//! - Symbolic links are never followed and never reported
//! - Gitignore-style patterns prune whole directories
//! - Hidden entries can be skipped
//! - Per-entry failures are yielded as [`ScanError`] without stopping the walk
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use photodedup::scanner::{ScanConfig, Walker};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/photos"), ScanConfig::default());
//! let records: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", records.len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::{Parallelism, WalkDirGeneric};

use super::hardlink::StorageId;
use super::names::NameCache;
use super::{FileRecord, ScanConfig, ScanError};
use crate::progress::ProgressCallback;

/// Per-entry jwalk state: the record (or error) built while listing.
type EntryState = ((), Option<Result<FileRecord, ScanError>>);

/// Work done for each directory entry on the traversal pool.
#[derive(Debug)]
struct EntryInspector {
    root: PathBuf,
    min_file_size: u64,
    gitignore: Option<Gitignore>,
    names: Arc<NameCache>,
}

impl EntryInspector {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Some(gitignore) = &self.gitignore else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            return false;
        }
        let relative = relative.to_string_lossy();
        let normalized = if cfg!(windows) {
            relative.replace('\\', "/")
        } else {
            relative.into_owned()
        };
        gitignore.matched(normalized, is_dir).is_ignore()
    }

    fn inspect(&self, path: PathBuf) -> Option<Result<FileRecord, ScanError>> {
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => return Some(Err(report_io_error(path, e))),
        };

        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        if size < self.min_file_size {
            log::trace!("Skipping {} ({} bytes, below minimum)", path.display(), size);
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = metadata.created().ok();
        let parsed = path
            .file_name()
            .map(|name| self.names.parse(&name.to_string_lossy()))
            .unwrap_or_default();

        Some(Ok(FileRecord::with_parsed_name(path, size, modified, parsed)
            .with_created(created)
            .with_storage_id(StorageId::from_metadata(&metadata))))
    }
}

fn report_io_error(path: PathBuf, error: std::io::Error) -> ScanError {
    match error.kind() {
        std::io::ErrorKind::NotFound => {
            log::debug!("Entry vanished during scan: {}", path.display());
        }
        _ => log::warn!("Cannot inspect {}: {}", path.display(), error),
    }
    ScanError::from_io(path, error)
}

/// Directory walker for parallel file discovery.
pub struct Walker {
    root: PathBuf,
    config: ScanConfig,
    names: Arc<NameCache>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("names", &self.names.len())
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given root.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `config` - Filtering and parallelism options
    #[must_use]
    pub fn new(path: &Path, config: ScanConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            names: Arc::new(NameCache::new()),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Share a name cache with other components of the run.
    #[must_use]
    pub fn with_name_cache(mut self, names: Arc<NameCache>) -> Self {
        self.names = names;
        self
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// Once the flag is set the iterator ends at the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report each discovered file to a progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the ignore matcher from config patterns and a root .gitignore.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the tree, yielding file records and per-entry errors.
    ///
    /// Record order follows traversal order, which is not stable across
    /// runs; callers that need determinism sort the collected records.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let inspector = Arc::new(EntryInspector {
            root: self.root.clone(),
            min_file_size: self.config.min_file_size,
            gitignore: self.build_gitignore(),
            names: Arc::clone(&self.names),
        });

        let walk_dir = WalkDirGeneric::<EntryState>::new(&self.root)
            .follow_links(false)
            .skip_hidden(self.config.skip_hidden)
            .parallelism(Parallelism::RayonNewPool(self.config.workers.max(1)))
            .process_read_dir(move |_depth, _dir, _state, children| {
                children.retain(|child| match child {
                    Ok(entry) => {
                        let ignored =
                            inspector.is_ignored(&entry.path(), entry.file_type().is_dir());
                        if ignored {
                            log::trace!("Ignoring {}", entry.path().display());
                        }
                        !ignored
                    }
                    Err(_) => true,
                });
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
                for entry in children.iter_mut().flatten() {
                    if entry.file_type().is_file() {
                        entry.client_state = inspector.inspect(entry.path());
                    }
                }
            });

        let mut discovered = 0usize;
        walk_dir
            .into_iter()
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry| match entry {
                Ok(mut entry) => {
                    // jwalk reports a directory it could not list on the
                    // directory's own entry, not as an `Err` item.
                    if let Some(e) = entry.read_children_error.take() {
                        return Some(Err(self.convert_jwalk_error(e)));
                    }
                    let result = entry.client_state.take()?;
                    if let (Ok(record), Some(callback)) = (&result, &self.progress_callback) {
                        discovered += 1;
                        callback.on_progress(discovered, &record.path.to_string_lossy());
                    }
                    Some(result)
                }
                Err(e) => Some(Err(self.convert_jwalk_error(e))),
            })
    }

    fn convert_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        match error.io_error() {
            Some(io) => report_io_error(path, std::io::Error::new(io.kind(), io.to_string())),
            None => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Walk {
                    path,
                    message: error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(&vec![b'x'; len]).unwrap();
        path
    }

    fn config(min_file_size: u64) -> ScanConfig {
        ScanConfig {
            min_file_size,
            workers: 2,
            ..ScanConfig::default()
        }
    }

    fn collect(walker: &Walker) -> Vec<FileRecord> {
        let mut records: Vec<_> = walker.walk().filter_map(Result::ok).collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        records
    }

    #[test]
    fn test_walker_finds_nested_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", 10);
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir.path().join("sub"), "b.jpg", 10);

        let records = collect(&Walker::new(dir.path(), config(1)));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.size == 10));
    }

    #[test]
    fn test_min_size_is_inclusive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "exact.jpg", 100);
        write(dir.path(), "below.jpg", 99);

        let records = collect(&Walker::new(dir.path(), config(100)));
        assert_eq!(records.len(), 1);
        assert!(records[0].path.ends_with("exact.jpg"));
    }

    #[test]
    fn test_records_carry_derived_key() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "IMG_001_1.jpg", 10);

        let records = collect(&Walker::new(dir.path(), config(1)));
        assert_eq!(&*records[0].derived_key, "IMG_001.jpg");
        assert_eq!(records[0].sequence, 1);
    }

    #[test]
    fn test_skip_hidden() {
        let dir = tempfile::Builder::new().prefix("walk").tempdir().unwrap();
        write(dir.path(), "visible.jpg", 10);
        write(dir.path(), ".hidden.jpg", 10);

        let mut cfg = config(1);
        cfg.skip_hidden = true;
        assert_eq!(collect(&Walker::new(dir.path(), cfg)).len(), 1);
        assert_eq!(collect(&Walker::new(dir.path(), config(1))).len(), 2);
    }

    #[test]
    fn test_ignore_patterns_prune_directories() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep.jpg", 10);
        write(dir.path(), "skip.tmp", 10);
        fs::create_dir(dir.path().join("thumbs")).unwrap();
        write(&dir.path().join("thumbs"), "t.jpg", 10);

        let mut cfg = config(1);
        cfg.ignore_patterns = vec!["*.tmp".to_string(), "thumbs/".to_string()];
        let records = collect(&Walker::new(dir.path(), cfg));
        assert_eq!(records.len(), 1);
        assert!(records[0].path.ends_with("keep.jpg"));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_not_reported() {
        let dir = TempDir::new().unwrap();
        let target = write(dir.path(), "real.jpg", 10);
        std::os::unix::fs::symlink(&target, dir.path().join("link.jpg")).unwrap();

        let records = collect(&Walker::new(dir.path(), config(1)));
        assert_eq!(records.len(), 1);
        assert!(records[0].path.ends_with("real.jpg"));
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_directory_yields_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        write(&locked, "inside.jpg", 10);
        fs::create_dir(dir.path().join("open")).unwrap();
        write(&dir.path().join("open"), "a.jpg", 10);
        write(dir.path(), "top.jpg", 10);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        if fs::read_dir(&locked).is_ok() {
            // Running with privileges that ignore directory modes.
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let results: Vec<_> = Walker::new(dir.path(), config(1)).walk().collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let errors: Vec<&ScanError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ScanError::PermissionDenied(_)));
        assert!(errors[0].path().ends_with("locked"));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }

    #[test]
    fn test_shutdown_stops_walk() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            write(dir.path(), &format!("f{i}.jpg"), 10);
        }

        let flag = Arc::new(AtomicBool::new(true));
        let walker = Walker::new(dir.path(), config(1)).with_shutdown_flag(flag);
        assert_eq!(walker.walk().count(), 0);
    }

    #[test]
    fn test_shared_name_cache_filled() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.jpg", 10);
        write(dir.path(), "b.jpg", 10);

        let names = Arc::new(NameCache::new());
        let walker = Walker::new(dir.path(), config(1)).with_name_cache(Arc::clone(&names));
        assert_eq!(walker.walk().count(), 2);
        assert_eq!(names.len(), 2);
    }
}
