//! Progressive content fingerprinting.
//!
//! # Overview
//!
//! Content verification runs in two stages so that most non-duplicates
//! are rejected after reading a few kilobytes:
//!
//! 1. **Quick fingerprint**: files up to [`SMALL_FILE_THRESHOLD`] are hashed
//!    whole. Larger files hash their size followed by a head sample, a
//!    middle sample (files of at least [`MIDDLE_SAMPLE_THRESHOLD`]) and a
//!    tail sample (files longer than two samples).
//! 2. **Full fingerprint**: the entire content, streamed in
//!    [`CHUNK_SIZE`] chunks or memory-mapped above the mmap threshold.
//!
//! Only files whose quick fingerprints collide are read in full, and small
//! files reuse their quick fingerprint because it already covers every byte.
//! Both stages memory-map files at or above the mmap threshold and fall
//! back to ordinary reads when mapping fails.
//!
//! # Example
//!
//! ```no_run
//! use photodedup::scanner::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new().with_algorithm(HashAlgorithm::Blake3);
//! let quick = hasher.quick_fingerprint(Path::new("photo.jpg"), 2_000_000)?;
//! println!("quick fingerprint: {}", quick);
//! # Ok::<(), photodedup::scanner::HashError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use super::{FileRecord, HashError};

/// Files at or below this size are fingerprinted whole in the quick stage.
pub const SMALL_FILE_THRESHOLD: u64 = 4 * 1024;

/// Default length of each quick-stage sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 4 * 1024;

/// Largest accepted quick-stage sample length.
pub const MAX_SAMPLE_SIZE: usize = 64 * 1024 * 1024;

/// Files of at least this size also get a middle sample.
pub const MIDDLE_SAMPLE_THRESHOLD: u64 = 1024 * 1024;

/// Default size above which full fingerprints use memory mapping.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Read size for streamed full fingerprints.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest algorithm behind a [`Fingerprint`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// XxHash64, fast and non-cryptographic
    #[default]
    Xxh64,
    /// BLAKE3, truncated to 128 bits
    Blake3,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xxh64 => write!(f, "xxh64"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Opaque content digest. Only equality is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Raw digest value.
    #[must_use]
    pub const fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Running digest state for one fingerprint.
enum Digest {
    Xxh64(XxHash64),
    Blake3(Box<blake3::Hasher>),
}

impl Digest {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Xxh64 => Self::Xxh64(XxHash64::with_seed(0)),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Xxh64(state) => state.write(bytes),
            Self::Blake3(state) => {
                state.update(bytes);
            }
        }
    }

    fn finish(self) -> Fingerprint {
        match self {
            Self::Xxh64(state) => Fingerprint(u128::from(state.finish())),
            Self::Blake3(state) => {
                let digest = state.finalize();
                let mut truncated = [0u8; 16];
                truncated.copy_from_slice(&digest.as_bytes()[..16]);
                Fingerprint(u128::from_le_bytes(truncated))
            }
        }
    }
}

/// Outcome of verifying one candidate group by content.
#[derive(Debug, Default)]
pub struct GroupVerification {
    /// Subsets of two or more members with identical full fingerprints
    pub identical: Vec<Vec<FileRecord>>,
    /// Members that could not be read; they never join a subset
    pub errors: Vec<HashError>,
    /// Members rejected after the quick stage alone
    pub quick_rejected: usize,
    /// Verification stopped early because shutdown was requested
    pub interrupted: bool,
}

/// Fingerprint calculator.
///
/// Cheap to clone; clones share the byte counter.
#[derive(Debug, Clone)]
pub struct Hasher {
    algorithm: HashAlgorithm,
    sample_size: usize,
    use_mmap: bool,
    mmap_threshold: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
    bytes_read: Arc<AtomicU64>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            shutdown_flag: None,
            bytes_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Select the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the quick-stage sample length. Zero is treated as one byte.
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    /// Enable or disable memory mapping for both fingerprint stages.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the size at or above which memory mapping is used.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Set the shutdown flag checked between chunks.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Selected algorithm.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Total bytes read from disk by this hasher and its clones.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn should_mmap(&self, size: u64) -> bool {
        self.use_mmap && size > 0 && size >= self.mmap_threshold
    }

    /// Byte ranges read by the quick stage, as `(offset, length)` pairs.
    ///
    /// A single range covering the whole file means the quick fingerprint
    /// is already a full fingerprint.
    #[must_use]
    pub fn sample_plan(&self, size: u64) -> Vec<(u64, u64)> {
        if size <= SMALL_FILE_THRESHOLD {
            return vec![(0, size)];
        }

        let sample = self.sample_size as u64;
        let mut plan = vec![(0, sample.min(size))];
        if size >= MIDDLE_SAMPLE_THRESHOLD {
            let offset = (size / 2).saturating_sub(sample / 2);
            plan.push((offset, sample.min(size - offset)));
        }
        if size > sample.saturating_mul(2) {
            plan.push((size - sample, sample));
        }
        plan
    }

    fn open_checked(&self, path: &Path, expected_size: u64) -> Result<File, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        let actual = file
            .metadata()
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?
            .len();
        if actual != expected_size {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_size,
                actual,
            });
        }
        Ok(file)
    }

    /// Compute the quick fingerprint of a file.
    ///
    /// # Arguments
    ///
    /// * `path` - File to read
    /// * `expected_size` - Size recorded during the scan
    ///
    /// # Errors
    ///
    /// Returns [`HashError::SizeChanged`] if the file no longer has
    /// `expected_size` bytes, or an I/O classification otherwise.
    pub fn quick_fingerprint(
        &self,
        path: &Path,
        expected_size: u64,
    ) -> Result<Fingerprint, HashError> {
        let file = self.open_checked(path, expected_size)?;
        if self.should_mmap(expected_size) {
            match self.quick_fingerprint_mmap(path, &file, expected_size) {
                Ok(fingerprint) => return Ok(fingerprint),
                Err(HashError::Io { source, .. }) => {
                    log::debug!(
                        "Memory mapping failed for {}: {}, reading samples instead",
                        path.display(),
                        source
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.quick_fingerprint_buffered(path, file, expected_size)
    }

    fn quick_digest(&self, expected_size: u64) -> (Digest, Vec<(u64, u64)>) {
        let plan = self.sample_plan(expected_size);
        let whole = plan.len() == 1 && plan[0] == (0, expected_size);

        let mut digest = Digest::new(self.algorithm);
        if !whole {
            digest.update(&expected_size.to_le_bytes());
        }
        (digest, plan)
    }

    fn quick_fingerprint_mmap(
        &self,
        path: &Path,
        file: &File,
        expected_size: u64,
    ) -> Result<Fingerprint, HashError> {
        // SAFETY: read-only map dropped before returning, size checked below.
        let map = unsafe { Mmap::map(file) }.map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if map.len() as u64 != expected_size {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: map.len() as u64,
            });
        }

        let (mut digest, plan) = self.quick_digest(expected_size);
        for (offset, length) in plan {
            let start = offset as usize;
            digest.update(&map[start..start + length as usize]);
            self.bytes_read.fetch_add(length, Ordering::Relaxed);
        }
        Ok(digest.finish())
    }

    fn quick_fingerprint_buffered(
        &self,
        path: &Path,
        mut file: File,
        expected_size: u64,
    ) -> Result<Fingerprint, HashError> {
        let (mut digest, plan) = self.quick_digest(expected_size);

        let mut buffer = Vec::with_capacity(self.sample_size.max(SMALL_FILE_THRESHOLD as usize));
        for (offset, length) in plan {
            buffer.resize(length as usize, 0);
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
            file.read_exact(&mut buffer)
                .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
            self.bytes_read.fetch_add(length, Ordering::Relaxed);
            digest.update(&buffer);
        }

        Ok(digest.finish())
    }

    /// Compute the fingerprint of the entire file content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Interrupted`] when shutdown is requested
    /// mid-file, [`HashError::SizeChanged`] when the length differs from
    /// `expected_size` before or during reading.
    pub fn full_fingerprint(
        &self,
        path: &Path,
        expected_size: u64,
    ) -> Result<Fingerprint, HashError> {
        let file = self.open_checked(path, expected_size)?;
        if self.should_mmap(expected_size) {
            match self.full_fingerprint_mmap(path, &file) {
                Ok(fingerprint) => return Ok(fingerprint),
                Err(HashError::Io { source, .. }) => {
                    log::debug!(
                        "Memory mapping failed for {}: {}, streaming instead",
                        path.display(),
                        source
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.full_fingerprint_streamed(path, file, expected_size)
    }

    fn full_fingerprint_mmap(&self, path: &Path, file: &File) -> Result<Fingerprint, HashError> {
        // SAFETY: the map is read-only and dropped before returning. A file
        // truncated underneath us can fault; the size check just before
        // mapping narrows that window to the same one streamed reads have.
        let map = unsafe { Mmap::map(file) }.map_err(|e| HashError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut digest = Digest::new(self.algorithm);
        for chunk in map.chunks(CHUNK_SIZE) {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            digest.update(chunk);
            self.bytes_read
                .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        }
        Ok(digest.finish())
    }

    fn full_fingerprint_streamed(
        &self,
        path: &Path,
        mut file: File,
        expected_size: u64,
    ) -> Result<Fingerprint, HashError> {
        let mut digest = Digest::new(self.algorithm);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path.to_path_buf(), e)),
            };
            digest.update(&buffer[..n]);
            total += n as u64;
            self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        }

        if total != expected_size {
            return Err(HashError::SizeChanged {
                path: path.to_path_buf(),
                expected: expected_size,
                actual: total,
            });
        }
        Ok(digest.finish())
    }

    /// Split a candidate group into subsets of byte-identical files.
    ///
    /// Members are read one after another on the calling thread. Unreadable
    /// members are reported in [`GroupVerification::errors`] and excluded;
    /// the rest of the group is still verified.
    #[must_use]
    pub fn verify_group(&self, members: &[FileRecord]) -> GroupVerification {
        let mut outcome = GroupVerification::default();

        let mut by_quick: HashMap<Fingerprint, Vec<&FileRecord>> = HashMap::new();
        for record in members {
            if self.is_shutdown_requested() {
                outcome.interrupted = true;
                return outcome;
            }
            match self.quick_fingerprint(&record.path, record.size) {
                Ok(fp) => by_quick.entry(fp).or_default().push(record),
                Err(e) => {
                    log::warn!("Skipping {}: {}", record.path.display(), e);
                    outcome.errors.push(e);
                }
            }
        }

        let mut by_full: HashMap<Fingerprint, Vec<FileRecord>> = HashMap::new();
        for (quick, colliding) in by_quick {
            if colliding.len() < 2 {
                outcome.quick_rejected += colliding.len();
                continue;
            }
            for record in colliding {
                // The quick stage already hashed every byte of small files.
                if record.size <= SMALL_FILE_THRESHOLD {
                    by_full.entry(quick).or_default().push(record.clone());
                    continue;
                }
                match self.full_fingerprint(&record.path, record.size) {
                    Ok(fp) => by_full.entry(fp).or_default().push(record.clone()),
                    Err(HashError::Interrupted(_)) => {
                        outcome.interrupted = true;
                        return outcome;
                    }
                    Err(e) => {
                        log::warn!("Skipping {}: {}", record.path.display(), e);
                        outcome.errors.push(e);
                    }
                }
            }
        }

        outcome.identical = by_full
            .into_values()
            .filter(|subset| subset.len() >= 2)
            .collect();
        outcome
    }
}
