//! Metadata-only confidence scoring for candidate groups.
//!
//! A score in `[0.0, 1.0]` summarises how strongly a group's metadata
//! suggests its members are copies of one another:
//!
//! | Signal                                  | Weight |
//! |-----------------------------------------|--------|
//! | All members share the derived key       | 0.3    |
//! | Timestamp span within the tolerance     | 0.2    |
//! | All members have the same size          | 0.4    |
//! | Sorted sequence numbers gap at most 10  | 0.1    |
//!
//! Weights are kept as integer points so sums are exact and comparisons
//! against a threshold never suffer from float rounding.

use std::time::Duration;

use serde::Serialize;

use super::CandidateGroup;
use crate::error::ConfigError;
use crate::scanner::FileRecord;

/// Default window for the timestamp signal.
pub const DEFAULT_TIMESTAMP_TOLERANCE: Duration = Duration::from_secs(300);

/// Largest gap between consecutive sequence numbers still counted as sequential.
pub const MAX_SEQUENCE_GAP: u64 = 10;

/// Default threshold; 1.0 means every group is content-verified.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 1.0;

const NAME_POINTS: u8 = 30;
const TIMESTAMP_POINTS: u8 = 20;
const SIZE_POINTS: u8 = 40;
const SEQUENCE_POINTS: u8 = 10;

/// Confidence in `[0.0, 1.0]`, stored as whole percentage points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "f64")]
pub struct ConfidenceScore(u8);

impl ConfidenceScore {
    /// Build a score from points out of 100; values above 100 saturate.
    #[must_use]
    pub const fn from_points(points: u8) -> Self {
        if points > 100 {
            Self(100)
        } else {
            Self(points)
        }
    }

    /// Points out of 100.
    #[must_use]
    pub const fn points(self) -> u8 {
        self.0
    }

    /// Score as a fraction.
    #[must_use]
    pub fn value(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl From<ConfidenceScore> for f64 {
    fn from(score: ConfidenceScore) -> Self {
        score.value()
    }
}

impl std::fmt::Display for ConfidenceScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.value())
    }
}

/// Which signals fired for a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    /// Every member has the same derived key
    pub same_name: bool,
    /// Creation timestamps fall within the tolerance
    pub close_timestamps: bool,
    /// Every member has the same size
    pub same_size: bool,
    /// Sequence numbers form a run without large gaps
    pub sequential: bool,
}

impl Signals {
    /// Combined score.
    #[must_use]
    pub fn score(self) -> ConfidenceScore {
        let mut points = 0;
        if self.same_name {
            points += NAME_POINTS;
        }
        if self.close_timestamps {
            points += TIMESTAMP_POINTS;
        }
        if self.same_size {
            points += SIZE_POINTS;
        }
        if self.sequential {
            points += SEQUENCE_POINTS;
        }
        ConfidenceScore::from_points(points)
    }
}

/// Computes group scores from member metadata.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    timestamp_tolerance: Duration,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_TOLERANCE)
    }
}

impl ConfidenceScorer {
    /// Create a scorer with the given timestamp tolerance.
    #[must_use]
    pub const fn new(timestamp_tolerance: Duration) -> Self {
        Self {
            timestamp_tolerance,
        }
    }

    /// Evaluate every signal over a set of members.
    #[must_use]
    pub fn signals(&self, members: &[FileRecord]) -> Signals {
        let Some(first) = members.first() else {
            return Signals::default();
        };

        let same_name = members.iter().all(|m| m.derived_key == first.derived_key);
        let same_size = members.iter().all(|m| m.size == first.size);

        let earliest = members.iter().map(FileRecord::timestamp).min();
        let latest = members.iter().map(FileRecord::timestamp).max();
        let close_timestamps = match (earliest, latest) {
            (Some(earliest), Some(latest)) => {
                latest.duration_since(earliest).unwrap_or_default() <= self.timestamp_tolerance
            }
            _ => false,
        };

        let mut sequences: Vec<u64> = members.iter().map(|m| m.sequence).collect();
        sequences.sort_unstable();
        let sequential = sequences
            .windows(2)
            .all(|pair| pair[1] - pair[0] <= MAX_SEQUENCE_GAP);

        Signals {
            same_name,
            close_timestamps,
            same_size,
            sequential,
        }
    }

    /// Score a candidate group.
    #[must_use]
    pub fn score(&self, group: &CandidateGroup) -> ConfidenceScore {
        self.signals(group.members()).score()
    }
}

/// Decides whether a score alone is enough to accept a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    threshold: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl ConfidencePolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] unless `threshold` is a
    /// number within `0.0..=1.0`.
    pub fn new(threshold: f64) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Configured threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a group with this score skips content verification.
    ///
    /// A threshold of exactly 1.0 never accepts, so the default
    /// configuration verifies every group by content.
    #[must_use]
    pub fn accepts(&self, score: ConfidenceScore) -> bool {
        self.threshold < 1.0 && score.value() >= self.threshold
    }
}
