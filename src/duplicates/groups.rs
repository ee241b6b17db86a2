//! Candidate grouping and duplicate verdicts.
//!
//! # Overview
//!
//! Grouping is the cheap first filter. Two files can only be duplicates
//! if they have exactly the same size and the same derived key, so the
//! scan results are bucketed by size, each size bucket is split by key,
//! and every bucket with fewer than two members is dropped. No file
//! content is read here.
//!
//! # Example
//!
//! ```
//! use photodedup::duplicates::group_candidates;
//! use photodedup::scanner::FileRecord;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let now = SystemTime::now();
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/p/IMG_001.jpg"), 1024, now),
//!     FileRecord::new(PathBuf::from("/p/IMG_001_1.jpg"), 1024, now),
//!     FileRecord::new(PathBuf::from("/p/IMG_002.jpg"), 1024, now),
//! ];
//!
//! let (groups, stats) = group_candidates(records);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].len(), 2);
//! assert_eq!(stats.size_buckets, 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::confidence::ConfidenceScore;
use crate::scanner::FileRecord;

/// Files sharing one size and one derived key.
///
/// Members are ordered keeper first: earliest timestamp, then smallest path.
#[derive(Debug, Clone)]
pub struct CandidateGroup {
    size: u64,
    derived_key: Arc<str>,
    members: Vec<FileRecord>,
}

impl CandidateGroup {
    /// Build a group, returning `None` unless it has at least two members
    /// that all share one size and one derived key.
    #[must_use]
    pub fn new(mut members: Vec<FileRecord>) -> Option<Self> {
        let first = members.first()?;
        let size = first.size;
        let derived_key = Arc::clone(&first.derived_key);

        if members.len() < 2
            || members
                .iter()
                .any(|m| m.size != size || m.derived_key != derived_key)
        {
            return None;
        }

        members.sort_by(FileRecord::keeper_order);
        Some(Self {
            size,
            derived_key,
            members,
        })
    }

    /// Shared file size.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Shared derived key.
    #[must_use]
    pub fn derived_key(&self) -> &str {
        &self.derived_key
    }

    /// Members, keeper first.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Consume the group, returning its members.
    #[must_use]
    pub fn into_members(self) -> Vec<FileRecord> {
        self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a constructed group; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Space freed if every member but one were removed.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }
}

/// Counters from grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Records offered to the grouper
    pub total_files: usize,
    /// Distinct sizes seen
    pub unique_sizes: usize,
    /// Sizes shared by two or more records
    pub size_buckets: usize,
    /// Records eliminated because no other record had their size
    pub eliminated_by_size: usize,
    /// Records eliminated because no same-size record had their key
    pub eliminated_by_name: usize,
    /// Records in the resulting candidate groups
    pub candidate_files: usize,
}

impl GroupingStats {
    /// Fraction of records eliminated without reading content (0.0 to 100.0).
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.total_files - self.candidate_files) as f64 / self.total_files as f64 * 100.0
        }
    }
}

/// Bucket records by exact size.
///
/// Returns every bucket, including singletons, with first-pass counters.
#[must_use]
pub fn group_by_size(records: Vec<FileRecord>) -> (HashMap<u64, Vec<FileRecord>>, GroupingStats) {
    let mut stats = GroupingStats {
        total_files: records.len(),
        ..GroupingStats::default()
    };

    let mut by_size: HashMap<u64, Vec<FileRecord>> = HashMap::new();
    for record in records {
        by_size.entry(record.size).or_default().push(record);
    }

    stats.unique_sizes = by_size.len();
    for bucket in by_size.values() {
        if bucket.len() < 2 {
            stats.eliminated_by_size += bucket.len();
        } else {
            stats.size_buckets += 1;
        }
    }

    (by_size, stats)
}

/// Group records into candidate groups by size and derived key.
///
/// Every record appears in at most one group. Groups are returned largest
/// file size first, then by derived key, so processing order does not
/// depend on scan order.
#[must_use]
pub fn group_candidates(records: Vec<FileRecord>) -> (Vec<CandidateGroup>, GroupingStats) {
    let (by_size, mut stats) = group_by_size(records);

    let mut groups = Vec::new();
    for bucket in by_size.into_values().filter(|b| b.len() >= 2) {
        let mut by_key: HashMap<Arc<str>, Vec<FileRecord>> = HashMap::new();
        for record in bucket {
            by_key
                .entry(Arc::clone(&record.derived_key))
                .or_default()
                .push(record);
        }
        for members in by_key.into_values() {
            if members.len() < 2 {
                stats.eliminated_by_name += members.len();
                continue;
            }
            if let Some(group) = CandidateGroup::new(members) {
                stats.candidate_files += group.len();
                groups.push(group);
            }
        }
    }

    groups.sort_by(|a, b| {
        b.size
            .cmp(&a.size)
            .then_with(|| a.derived_key.cmp(&b.derived_key))
    });

    log::info!(
        "Grouping complete: {} files -> {} candidate groups ({} files, {:.1}% eliminated)",
        stats.total_files,
        groups.len(),
        stats.candidate_files,
        stats.elimination_rate()
    );

    (groups, stats)
}

/// How a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Confidence met the threshold; content was not read
    ConfidenceAccepted,
    /// Full fingerprints matched
    ContentVerified,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfidenceAccepted => write!(f, "confidence_accepted"),
            Self::ContentVerified => write!(f, "content_verified"),
        }
    }
}

/// One original and the copies redundant to it.
#[derive(Debug, Clone)]
pub struct DuplicateVerdict {
    /// File that is kept
    pub original: FileRecord,
    /// Files that may be removed, never empty
    pub redundant: Vec<FileRecord>,
    /// How the verdict was reached
    pub resolution: Resolution,
    /// Group confidence at scoring time
    pub confidence: ConfidenceScore,
}

impl DuplicateVerdict {
    /// Pick the keeper among `members` and mark the rest redundant.
    ///
    /// Returns `None` for fewer than two members.
    #[must_use]
    pub fn resolve(
        mut members: Vec<FileRecord>,
        resolution: Resolution,
        confidence: ConfidenceScore,
    ) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        members.sort_by(FileRecord::keeper_order);
        let mut members = members.into_iter();
        let original = members.next()?;
        Some(Self {
            original,
            redundant: members.collect(),
            resolution,
            confidence,
        })
    }

    /// Bytes held by the redundant copies.
    #[must_use]
    pub fn redundant_bytes(&self) -> u64 {
        self.redundant.iter().map(|r| r.size).sum()
    }
}
