//! Hard-link removal before grouping.
//!
//! # Overview
//!
//! Hard links are several directory entries for one stored object. They
//! look like perfect duplicates (same size, same bytes) but deleting one
//! reclaims nothing and, worse, the survivor might be the entry the user
//! thinks of as the copy. Every storage object must therefore appear at
//! most once in the candidate set.
//!
//! # Platform Support
//!
//! - **Unix**: identity is the `(device, inode)` pair from metadata
//! - **Other**: no usable identity is exposed without opening handles;
//!   records only collapse when their paths are identical
//!
//! # Example
//!
//! ```
//! use photodedup::scanner::{FileRecord, HardlinkFilter, StorageId};
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let id = Some(StorageId::new(1, 42));
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/a/IMG_1.jpg"), 10, now).with_storage_id(id),
//!     FileRecord::new(PathBuf::from("/b/IMG_1.jpg"), 10, now).with_storage_id(id),
//! ];
//!
//! let (kept, stats) = HardlinkFilter::new().filter(records);
//! assert_eq!(kept.len(), 1);
//! assert_eq!(stats.links_removed, 1);
//! ```

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::PathBuf;

use super::FileRecord;

/// Identity of a stored object on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId {
    device: u64,
    inode: u64,
}

impl StorageId {
    /// Create an identity from raw device and inode numbers.
    #[must_use]
    pub const fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Read the identity from file metadata.
    ///
    /// Returns `None` on platforms where metadata carries no inode.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    /// Read the identity from file metadata.
    ///
    /// Returns `None` on platforms where metadata carries no inode.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Whether the identity can be trusted to tell objects apart.
    ///
    /// Some network and FUSE filesystems report inode 0 for every entry.
    #[must_use]
    pub const fn is_reliable(&self) -> bool {
        self.inode != 0
    }

    /// Device number.
    #[must_use]
    pub const fn device(&self) -> u64 {
        self.device
    }

    /// Inode number.
    #[must_use]
    pub const fn inode(&self) -> u64 {
        self.inode
    }
}

/// Counters from a filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardlinkStats {
    /// Records seen
    pub records_in: usize,
    /// Records dropped because their storage object was already kept
    pub links_removed: usize,
    /// Records dropped because their exact path was already kept
    pub paths_collapsed: usize,
    /// Records with no reliable storage identity
    pub without_identity: usize,
}

impl HardlinkStats {
    /// Records that survived the filter.
    #[must_use]
    pub fn records_out(&self) -> usize {
        self.records_in - self.links_removed - self.paths_collapsed
    }
}

/// Keeps the first record of every storage object.
///
/// Input order decides which entry survives, so callers sort the records
/// first when the choice must be reproducible.
#[derive(Debug, Default)]
pub struct HardlinkFilter {
    seen_ids: HashSet<StorageId>,
    linked_ids: HashSet<StorageId>,
    seen_paths: HashSet<PathBuf>,
}

impl HardlinkFilter {
    /// Create an empty filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether storage identities are available on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }

    /// Whether `record` shares its storage with an entry the filter dropped.
    ///
    /// Removing such a record frees no space while the dropped link remains.
    #[must_use]
    pub fn has_dropped_links(&self, record: &FileRecord) -> bool {
        record
            .storage_id
            .is_some_and(|id| self.linked_ids.contains(&id))
    }

    /// Remove every record whose storage object (or path) was already seen.
    pub fn filter(&mut self, records: Vec<FileRecord>) -> (Vec<FileRecord>, HardlinkStats) {
        let mut stats = HardlinkStats {
            records_in: records.len(),
            ..HardlinkStats::default()
        };
        let mut kept = Vec::with_capacity(records.len());

        for record in records {
            if !self.seen_paths.insert(record.path.clone()) {
                stats.paths_collapsed += 1;
                continue;
            }

            match record.storage_id.filter(StorageId::is_reliable) {
                Some(id) => {
                    if !self.seen_ids.insert(id) {
                        log::debug!(
                            "Skipping hard link {} (inode {} on device {})",
                            record.path.display(),
                            id.inode(),
                            id.device()
                        );
                        stats.links_removed += 1;
                        self.linked_ids.insert(id);
                        continue;
                    }
                }
                None => stats.without_identity += 1,
            }

            kept.push(record);
        }

        (kept, stats)
    }
}
