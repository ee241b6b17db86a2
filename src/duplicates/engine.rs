//! Duplicate engine orchestrating the detection pipeline.
//!
//! # Overview
//!
//! A run moves through these stages:
//! 1. **Scan** - walk the root and collect [`FileRecord`]s
//! 2. **Link filter** - keep one entry per storage object
//! 3. **Group** - bucket by size and derived key
//! 4. **Score** - metadata-only confidence per group
//! 5. **Verify** - groups below the threshold are compared by content
//! 6. **Act** - report (simulate) or remove (apply) redundant copies
//!
//! Stages 4 to 6 run per group on a bounded worker pool. Groups never
//! share files, so they are processed independently.
//!
//! Each group moves through [`GroupState`] exactly once and never
//! revisits an earlier state.
//!
//! # Example
//!
//! ```no_run
//! use photodedup::duplicates::{DuplicateEngine, EngineConfig, ExecutionMode};
//!
//! let config = EngineConfig::new("/photos").with_mode(ExecutionMode::Simulate);
//! let engine = DuplicateEngine::new(config)?;
//! let report = engine.run()?;
//!
//! println!("{} groups, {} bytes reclaimable", report.groups_found, report.bytes_reclaimable_or_reclaimed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use super::confidence::{ConfidencePolicy, ConfidenceScore, ConfidenceScorer};
use super::groups::{group_candidates, CandidateGroup, DuplicateVerdict, GroupingStats, Resolution};
use crate::actions::delete::{
    ensure_original_present, remove_redundant, validate_keeps_original, DeleteError, FileRemover,
};
use crate::actions::DeleteMethod;
use crate::error::ConfigError;
use crate::progress::{ProgressCallback, PHASE_SCAN, PHASE_VERIFY};
use crate::scanner::hasher::{DEFAULT_MMAP_THRESHOLD, DEFAULT_SAMPLE_SIZE, MAX_SAMPLE_SIZE};
use crate::scanner::{
    default_workers, FileRecord, HardlinkFilter, HashAlgorithm, HashError, Hasher, NameCache,
    ScanConfig, ScanError, Walker, DEFAULT_MIN_FILE_SIZE,
};

/// Whether a run may change the filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Report what would be removed; touch nothing
    #[default]
    Simulate,
    /// Remove redundant copies through the configured remover
    Apply,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulate => write!(f, "simulate"),
            Self::Apply => write!(f, "apply"),
        }
    }
}

/// Pipeline stage an error was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    /// Walking the tree or reading metadata
    Scan,
    /// Reading content for fingerprints
    Hash,
    /// Removing a redundant copy
    Action,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan => write!(f, "scan"),
            Self::Hash => write!(f, "hash"),
            Self::Action => write!(f, "action"),
        }
    }
}

/// A per-file failure that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunError {
    /// Stage the error occurred in
    pub stage: ErrorStage,
    /// File or directory involved, when known
    pub path: Option<PathBuf>,
    /// Human-readable description
    pub message: String,
}

impl RunError {
    fn scan(err: &ScanError) -> Self {
        Self {
            stage: ErrorStage::Scan,
            path: Some(err.path().to_path_buf()),
            message: err.to_string(),
        }
    }

    fn hash(err: &HashError) -> Self {
        Self {
            stage: ErrorStage::Hash,
            path: Some(err.path().to_path_buf()),
            message: err.to_string(),
        }
    }

    fn action(err: &DeleteError) -> Self {
        Self {
            stage: ErrorStage::Action,
            path: err.path().map(Path::to_path_buf),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

/// Errors that prevent a run from producing a report.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool could not be created.
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration for a run.
#[derive(Clone)]
pub struct EngineConfig {
    /// Directory to scan
    pub root: PathBuf,
    /// Files strictly smaller than this are ignored
    pub min_file_size: u64,
    /// Groups scoring at least this skip content verification (1.0 = never)
    pub confidence_threshold: f64,
    /// Window for the timestamp signal
    pub timestamp_tolerance: Duration,
    /// Bound on concurrent workers for traversal and verification
    pub workers: usize,
    /// Simulate or apply
    pub mode: ExecutionMode,
    /// Fingerprint digest
    pub hash_algorithm: HashAlgorithm,
    /// Quick-stage sample length in bytes
    pub sample_size: usize,
    /// Whether full fingerprints may use memory mapping
    pub use_mmap: bool,
    /// Size at or above which memory mapping is used
    pub mmap_threshold: u64,
    /// Skip hidden entries
    pub skip_hidden: bool,
    /// Gitignore-style patterns to exclude
    pub ignore_patterns: Vec<String>,
    /// Cap on files sent to content verification; `None` is unlimited
    pub max_verify_files: Option<usize>,
    /// How apply mode removes copies
    pub remover: Arc<dyn FileRemover>,
    /// Cooperative cancellation flag
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Progress sink
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("root", &self.root)
            .field("min_file_size", &self.min_file_size)
            .field("confidence_threshold", &self.confidence_threshold)
            .field("timestamp_tolerance", &self.timestamp_tolerance)
            .field("workers", &self.workers)
            .field("mode", &self.mode)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("sample_size", &self.sample_size)
            .field("use_mmap", &self.use_mmap)
            .field("mmap_threshold", &self.mmap_threshold)
            .field("skip_hidden", &self.skip_hidden)
            .field("ignore_patterns", &self.ignore_patterns)
            .field("max_verify_files", &self.max_verify_files)
            .field("remover", &self.remover.name())
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl EngineConfig {
    /// Defaults for scanning `root`: simulate mode, threshold 1.0.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_file_size: DEFAULT_MIN_FILE_SIZE,
            confidence_threshold: super::confidence::DEFAULT_CONFIDENCE_THRESHOLD,
            timestamp_tolerance: super::confidence::DEFAULT_TIMESTAMP_TOLERANCE,
            workers: default_workers(),
            mode: ExecutionMode::Simulate,
            hash_algorithm: HashAlgorithm::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            use_mmap: true,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            max_verify_files: None,
            remover: DeleteMethod::default().remover(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    /// Set the confidence threshold.
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the timestamp tolerance.
    #[must_use]
    pub fn with_timestamp_tolerance(mut self, tolerance: Duration) -> Self {
        self.timestamp_tolerance = tolerance;
        self
    }

    /// Set the worker count.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the execution mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the fingerprint algorithm.
    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Set the quick-stage sample length.
    #[must_use]
    pub fn with_sample_size(mut self, bytes: usize) -> Self {
        self.sample_size = bytes;
        self
    }

    /// Configure memory mapping for full fingerprints.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool, threshold: u64) -> Self {
        self.use_mmap = enabled;
        self.mmap_threshold = threshold;
        self
    }

    /// Skip hidden entries.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Set ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Limit how many files content verification may read.
    ///
    /// Groups below the confidence threshold are verified in candidate
    /// order until the budget is spent; later ones are reported as
    /// unverified and never resolved.
    #[must_use]
    pub fn with_max_verify_files(mut self, limit: Option<usize>) -> Self {
        self.max_verify_files = limit;
        self
    }

    /// Set the remover used in apply mode.
    #[must_use]
    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check every setting that does not need the filesystem.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfidencePolicy::new(self.confidence_threshold)?;
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.sample_size == 0 || self.sample_size > MAX_SAMPLE_SIZE {
            return Err(ConfigError::InvalidSampleSize(self.sample_size));
        }
        Ok(())
    }
}

/// Life cycle of one candidate group.
#[derive(Debug)]
pub enum GroupState {
    /// Formed by size and derived key
    Grouped(CandidateGroup),
    /// Confidence computed
    Scored(CandidateGroup, ConfidenceScore),
    /// Accepted on confidence alone
    ConfidenceAccepted(CandidateGroup, ConfidenceScore),
    /// Split into byte-identical subsets
    ContentVerified(Vec<Vec<FileRecord>>, ConfidenceScore),
    /// Final verdicts, possibly none
    Resolved(Vec<DuplicateVerdict>),
}

/// One resolved verdict as reported to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    /// Derived key shared by the group
    pub derived_key: String,
    /// Size of each member in bytes
    pub size: u64,
    /// File kept
    pub original: PathBuf,
    /// Copies judged redundant
    pub redundant: Vec<PathBuf>,
    /// Copies actually removed (apply mode only)
    pub removed: Vec<PathBuf>,
    /// Copies whose removal failed (apply mode only)
    pub failed: Vec<PathBuf>,
    /// Copies hard-linked to an entry dropped before grouping; removing
    /// them frees no space
    pub linked: Vec<PathBuf>,
    /// How the verdict was reached
    pub resolution: Resolution,
    /// Group confidence
    pub confidence: ConfidenceScore,
}

impl ResolvedGroup {
    /// Combined size of every redundant copy.
    #[must_use]
    pub fn total_redundant_bytes(&self) -> u64 {
        self.size * self.redundant.len() as u64
    }

    /// Copies counted as resolved in `mode`.
    #[must_use]
    pub fn resolved_count(&self, mode: ExecutionMode) -> usize {
        match mode {
            ExecutionMode::Simulate => self.redundant.len(),
            ExecutionMode::Apply => self.removed.len(),
        }
    }

    /// Bytes reclaimable (simulate) or reclaimed (apply).
    ///
    /// Linked copies are counted as resolved but free nothing.
    #[must_use]
    pub fn bytes(&self, mode: ExecutionMode) -> u64 {
        let resolved = match mode {
            ExecutionMode::Simulate => &self.redundant,
            ExecutionMode::Apply => &self.removed,
        };
        let freeing = resolved
            .iter()
            .filter(|path| !self.linked.contains(path))
            .count();
        self.size * freeing as u64
    }
}

/// Result of a completed (or interrupted) run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Canonical root that was scanned
    pub root: PathBuf,
    /// Mode the run executed in
    pub mode: ExecutionMode,
    /// Resolved groups, ordered by original path
    pub groups: Vec<ResolvedGroup>,
    /// Regular files at or above the size minimum
    pub files_scanned: usize,
    /// Entries dropped as hard links of another entry
    pub hardlinks_removed: usize,
    /// Groups formed by size and derived key
    pub candidate_groups: usize,
    /// Counters from candidate grouping
    pub grouping: GroupingStats,
    /// Groups accepted on confidence alone
    pub groups_accepted: usize,
    /// Groups sent to content verification
    pub groups_verified: usize,
    /// Groups not started because of cancellation
    pub groups_skipped: usize,
    /// Groups left unresolved because the verification budget was spent
    pub groups_unverified: usize,
    /// Derived keys of those groups, sorted
    pub unverified_keys: Vec<String>,
    /// Verdicts produced
    pub groups_found: usize,
    /// Redundant copies found (simulate) or removed (apply)
    pub duplicates_resolved: usize,
    /// Bytes reclaimable (simulate) or reclaimed (apply)
    pub bytes_reclaimable_or_reclaimed: u64,
    /// Bytes read for fingerprints
    pub bytes_hashed: u64,
    /// Per-file failures, ordered by stage then path
    pub errors: Vec<RunError>,
    /// Wall-clock duration
    pub elapsed: Duration,
    /// Whether the run stopped early
    pub interrupted: bool,
}

impl RunReport {
    fn empty(root: PathBuf, mode: ExecutionMode) -> Self {
        Self {
            root,
            mode,
            groups: Vec::new(),
            files_scanned: 0,
            hardlinks_removed: 0,
            candidate_groups: 0,
            grouping: GroupingStats::default(),
            groups_accepted: 0,
            groups_verified: 0,
            groups_skipped: 0,
            groups_unverified: 0,
            unverified_keys: Vec::new(),
            groups_found: 0,
            duplicates_resolved: 0,
            bytes_reclaimable_or_reclaimed: 0,
            bytes_hashed: 0,
            errors: Vec::new(),
            elapsed: Duration::ZERO,
            interrupted: false,
        }
    }

    /// Duration in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Whether any per-file error was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// What processing one group produced.
#[derive(Debug, Default)]
struct GroupOutcome {
    resolved: Vec<ResolvedGroup>,
    errors: Vec<RunError>,
    accepted: bool,
    verified: bool,
    unverified: Option<String>,
    skipped: bool,
    interrupted: bool,
}

/// Runs the pipeline for one configuration.
pub struct DuplicateEngine {
    config: EngineConfig,
    root: PathBuf,
    scorer: ConfidenceScorer,
    policy: ConfidencePolicy,
    hasher: Hasher,
}

impl std::fmt::Debug for DuplicateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateEngine")
            .field("config", &self.config)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl DuplicateEngine {
    /// Validate the configuration and prepare a run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the root is missing or not a directory,
    /// or any setting is out of range.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = ConfidencePolicy::new(config.confidence_threshold)?;

        let root = match std::fs::canonicalize(&config.root) {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::RootNotFound(config.root.clone()))
            }
            Err(e) => {
                return Err(ConfigError::RootInaccessible {
                    path: config.root.clone(),
                    source: e,
                })
            }
        };
        if !root.is_dir() {
            return Err(ConfigError::RootNotADirectory(config.root.clone()));
        }

        let mut hasher = Hasher::new()
            .with_algorithm(config.hash_algorithm)
            .with_sample_size(config.sample_size)
            .with_mmap(config.use_mmap)
            .with_mmap_threshold(config.mmap_threshold);
        if let Some(flag) = &config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }

        Ok(Self {
            scorer: ConfidenceScorer::new(config.timestamp_tolerance),
            policy,
            hasher,
            root,
            config,
        })
    }

    /// Configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Scan the root and resolve every duplicate group found.
    ///
    /// Per-file failures are recorded in the report rather than returned.
    /// Cancellation yields `Ok` with [`RunReport::interrupted`] set.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ThreadPool`] if the worker pool cannot start.
    pub fn run(&self) -> Result<RunReport, EngineError> {
        let start = Instant::now();
        log::info!(
            "Starting {} run on {} ({} workers, threshold {})",
            self.config.mode,
            self.root.display(),
            self.config.workers,
            self.policy.threshold()
        );

        let (records, scan_errors) = self.scan();
        let mut report = if self.is_shutdown_requested() {
            let mut report = RunReport::empty(self.root.clone(), self.config.mode);
            report.files_scanned = records.len();
            report.interrupted = true;
            report
        } else {
            self.resolve(records)?
        };

        report.errors.extend(scan_errors.iter().map(RunError::scan));
        report.errors.sort_by(|a, b| (a.stage, &a.path).cmp(&(b.stage, &b.path)));
        report.elapsed = start.elapsed();

        log::info!(
            "Run complete: {} groups, {} duplicates, {} bytes {}, {} errors{}",
            report.groups_found,
            report.duplicates_resolved,
            report.bytes_reclaimable_or_reclaimed,
            match report.mode {
                ExecutionMode::Simulate => "reclaimable",
                ExecutionMode::Apply => "reclaimed",
            },
            report.errors.len(),
            if report.interrupted { " (interrupted)" } else { "" }
        );
        Ok(report)
    }

    fn scan(&self) -> (Vec<FileRecord>, Vec<ScanError>) {
        let scan_config = ScanConfig {
            min_file_size: self.config.min_file_size,
            skip_hidden: self.config.skip_hidden,
            ignore_patterns: self.config.ignore_patterns.clone(),
            workers: self.config.workers,
        };
        let mut walker = Walker::new(&self.root, scan_config).with_name_cache(Arc::new(NameCache::new()));
        if let Some(flag) = &self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(callback) = &self.config.progress_callback {
            callback.on_phase_start(PHASE_SCAN, 0);
            walker = walker.with_progress_callback(Arc::clone(callback));
        }

        let mut records = Vec::new();
        let mut errors = Vec::new();
        for result in walker.walk() {
            match result {
                Ok(record) => records.push(record),
                Err(e) => errors.push(e),
            }
        }

        if let Some(callback) = &self.config.progress_callback {
            callback.on_phase_end(PHASE_SCAN);
        }
        log::info!(
            "Scan complete: {} files, {} errors",
            records.len(),
            errors.len()
        );
        (records, errors)
    }

    /// Resolve duplicates among already collected records.
    ///
    /// Runs every stage after the scan. Records are sorted by path first,
    /// so the outcome does not depend on the order they were collected in.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ThreadPool`] if the worker pool cannot start.
    pub fn resolve(&self, mut records: Vec<FileRecord>) -> Result<RunReport, EngineError> {
        let mut report = RunReport::empty(self.root.clone(), self.config.mode);
        report.files_scanned = records.len();

        records.sort_by(|a, b| a.path.cmp(&b.path));
        let mut links = HardlinkFilter::new();
        let (records, link_stats) = links.filter(records);
        report.hardlinks_removed = link_stats.links_removed + link_stats.paths_collapsed;
        if report.hardlinks_removed > 0 {
            log::info!("Removed {} hard-linked entries", report.hardlinks_removed);
        }

        let (groups, grouping) = group_candidates(records);
        report.candidate_groups = groups.len();
        report.grouping = grouping;
        if groups.is_empty() {
            return Ok(report);
        }
        let planned = self.plan_verification(groups);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .build()?;

        if let Some(callback) = &self.config.progress_callback {
            callback.on_phase_start(PHASE_VERIFY, planned.len());
        }
        let completed = AtomicUsize::new(0);
        let bytes_before = self.hasher.bytes_read();

        let outcomes: Vec<GroupOutcome> = pool.install(|| {
            planned
                .into_par_iter()
                .map(|(group, may_verify)| {
                    let key = group.derived_key().to_string();
                    let outcome = self.process_group(group, may_verify, &links);
                    if let Some(callback) = &self.config.progress_callback {
                        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        callback.on_progress(done, &key);
                    }
                    outcome
                })
                .collect()
        });

        if let Some(callback) = &self.config.progress_callback {
            callback.on_phase_end(PHASE_VERIFY);
        }

        for outcome in outcomes {
            report.groups_accepted += usize::from(outcome.accepted);
            report.groups_verified += usize::from(outcome.verified);
            report.unverified_keys.extend(outcome.unverified);
            report.groups_skipped += usize::from(outcome.skipped);
            report.interrupted |= outcome.interrupted || outcome.skipped;
            report.errors.extend(outcome.errors);
            report.groups.extend(outcome.resolved);
        }

        report.groups.sort_by(|a, b| a.original.cmp(&b.original));
        report.unverified_keys.sort();
        report.groups_unverified = report.unverified_keys.len();
        report.groups_found = report.groups.len();
        report.duplicates_resolved = report
            .groups
            .iter()
            .map(|g| g.resolved_count(report.mode))
            .sum();
        report.bytes_reclaimable_or_reclaimed =
            report.groups.iter().map(|g| g.bytes(report.mode)).sum();
        report.bytes_hashed = self.hasher.bytes_read() - bytes_before;

        log::info!(
            "Verification complete: {} candidate groups -> {} accepted on confidence, {} verified by content, {} verdicts",
            report.candidate_groups,
            report.groups_accepted,
            report.groups_verified,
            report.groups_found
        );
        if report.groups_unverified > 0 {
            log::warn!(
                "{} groups left unverified: verification budget of {} files spent",
                report.groups_unverified,
                self.config.max_verify_files.unwrap_or_default()
            );
        }
        Ok(report)
    }

    /// Decide which groups may be content-verified under the budget.
    ///
    /// Groups are considered in candidate order, so the same input always
    /// spends the budget the same way. A group is admitted while fewer
    /// than `max_verify_files` files have been admitted before it.
    fn plan_verification(&self, groups: Vec<CandidateGroup>) -> Vec<(CandidateGroup, bool)> {
        let Some(limit) = self.config.max_verify_files else {
            return groups.into_iter().map(|group| (group, true)).collect();
        };

        let mut admitted = 0usize;
        groups
            .into_iter()
            .map(|group| {
                if self.policy.accepts(self.scorer.score(&group)) {
                    return (group, true);
                }
                let may_verify = admitted < limit;
                if may_verify {
                    admitted += group.len();
                }
                (group, may_verify)
            })
            .collect()
    }

    /// Drive one group from [`GroupState::Grouped`] to [`GroupState::Resolved`]
    /// and carry out its action.
    fn process_group(
        &self,
        group: CandidateGroup,
        may_verify: bool,
        links: &HardlinkFilter,
    ) -> GroupOutcome {
        let mut outcome = GroupOutcome::default();
        if self.is_shutdown_requested() {
            outcome.skipped = true;
            return outcome;
        }

        let mut state = GroupState::Grouped(group);
        let verdicts = loop {
            state = match state {
                GroupState::Grouped(group) => {
                    let score = self.scorer.score(&group);
                    log::debug!(
                        "Group '{}' ({} files, {} bytes each) scored {}",
                        group.derived_key(),
                        group.len(),
                        group.size(),
                        score
                    );
                    GroupState::Scored(group, score)
                }
                GroupState::Scored(group, score) => {
                    if self.policy.accepts(score) {
                        GroupState::ConfidenceAccepted(group, score)
                    } else if !may_verify {
                        log::debug!(
                            "Group '{}' not verified: verification budget spent",
                            group.derived_key()
                        );
                        outcome.unverified = Some(group.derived_key().to_string());
                        return outcome;
                    } else {
                        outcome.verified = true;
                        let verification = self.hasher.verify_group(group.members());
                        outcome
                            .errors
                            .extend(verification.errors.iter().map(RunError::hash));
                        if verification.interrupted {
                            log::debug!(
                                "Verification of '{}' interrupted, group left unresolved",
                                group.derived_key()
                            );
                            outcome.interrupted = true;
                            return outcome;
                        }
                        GroupState::ContentVerified(verification.identical, score)
                    }
                }
                GroupState::ConfidenceAccepted(group, score) => {
                    outcome.accepted = true;
                    GroupState::Resolved(
                        DuplicateVerdict::resolve(
                            group.into_members(),
                            Resolution::ConfidenceAccepted,
                            score,
                        )
                        .into_iter()
                        .collect(),
                    )
                }
                GroupState::ContentVerified(subsets, score) => GroupState::Resolved(
                    subsets
                        .into_iter()
                        .filter_map(|subset| {
                            DuplicateVerdict::resolve(subset, Resolution::ContentVerified, score)
                        })
                        .collect(),
                ),
                GroupState::Resolved(verdicts) => break verdicts,
            };
        };

        for verdict in verdicts {
            let resolved = self.execute(&verdict, links, &mut outcome.errors);
            outcome.resolved.push(resolved);
        }
        outcome
    }

    /// Carry out one verdict. Once started, every copy is attempted.
    fn execute(
        &self,
        verdict: &DuplicateVerdict,
        links: &HardlinkFilter,
        errors: &mut Vec<RunError>,
    ) -> ResolvedGroup {
        let redundant: Vec<PathBuf> = verdict.redundant.iter().map(|r| r.path.clone()).collect();
        let linked: Vec<PathBuf> = verdict
            .redundant
            .iter()
            .filter(|r| links.has_dropped_links(r))
            .map(|r| r.path.clone())
            .collect();
        let mut removed = Vec::new();
        let mut failed = Vec::new();

        if self.config.mode == ExecutionMode::Apply {
            if let Err(e) = validate_keeps_original(&verdict.original.path, &redundant) {
                log::error!("Skipping group '{}': {}", verdict.original.derived_key, e);
                errors.push(RunError::action(&e));
                return ResolvedGroup {
                    derived_key: verdict.original.derived_key.to_string(),
                    size: verdict.original.size,
                    original: verdict.original.path.clone(),
                    failed: redundant.clone(),
                    redundant,
                    removed,
                    linked,
                    resolution: verdict.resolution,
                    confidence: verdict.confidence,
                };
            }
            for copy in &verdict.redundant {
                let result = ensure_original_present(&verdict.original, &copy.path)
                    .and_then(|()| remove_redundant(copy, self.config.remover.as_ref()));
                match result {
                    Ok(_) => removed.push(copy.path.clone()),
                    Err(e) => {
                        log::warn!("Not removing {}: {}", copy.path.display(), e);
                        errors.push(RunError::action(&e));
                        failed.push(copy.path.clone());
                    }
                }
            }
        } else {
            for copy in &verdict.redundant {
                log::debug!(
                    "Would remove {} (copy of {})",
                    copy.path.display(),
                    verdict.original.path.display()
                );
            }
        }

        ResolvedGroup {
            derived_key: verdict.original.derived_key.to_string(),
            size: verdict.original.size,
            original: verdict.original.path.clone(),
            redundant,
            removed,
            failed,
            linked,
            resolution: verdict.resolution,
            confidence: verdict.confidence,
        }
    }
}
