//! JSON report for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "original_path": "/photos/IMG_001.jpg",
//!       "size_bytes": 5000,
//!       "redundant_paths": ["/photos/IMG_001_1.jpg"],
//!       "total_redundant_bytes": 5000,
//!       "resolution": "content_verified",
//!       "confidence": 1.0,
//!       "removed_paths": [],
//!       "failed_paths": []
//!     }
//!   ],
//!   "summary": {
//!     "root": "/photos",
//!     "mode": "simulate",
//!     "files_scanned": 2,
//!     "eliminated_by_size": 0,
//!     "eliminated_by_name": 0,
//!     "groups_unverified": 0,
//!     "unverified_groups": [],
//!     "groups_found": 1,
//!     "duplicates_resolved": 1,
//!     "bytes_reclaimable_or_reclaimed": 5000,
//!     "elapsed_seconds": 0.01,
//!     "interrupted": false,
//!     "exit_code": 0,
//!     "exit_code_name": "PD000"
//!   },
//!   "errors": []
//! }
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::duplicates::{
    ConfidenceScore, ExecutionMode, GroupingStats, Resolution, ResolvedGroup, RunReport,
};
use crate::duplicates::{ErrorStage, RunError};
use crate::error::ExitCode;

/// One resolved group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    /// File kept
    pub original_path: String,
    /// Size of each member
    pub size_bytes: u64,
    /// Copies judged redundant
    pub redundant_paths: Vec<String>,
    /// Combined size of the redundant copies
    pub total_redundant_bytes: u64,
    /// How the verdict was reached
    pub resolution: Resolution,
    /// Group confidence in `[0, 1]`
    pub confidence: ConfidenceScore,
    /// Copies removed (apply mode)
    pub removed_paths: Vec<String>,
    /// Copies whose removal failed (apply mode)
    pub failed_paths: Vec<String>,
}

impl From<&ResolvedGroup> for JsonGroup {
    fn from(group: &ResolvedGroup) -> Self {
        Self {
            original_path: path_string(&group.original),
            size_bytes: group.size,
            redundant_paths: group.redundant.iter().map(|p| path_string(p)).collect(),
            total_redundant_bytes: group.total_redundant_bytes(),
            resolution: group.resolution,
            confidence: group.confidence,
            removed_paths: group.removed.iter().map(|p| path_string(p)).collect(),
            failed_paths: group.failed.iter().map(|p| path_string(p)).collect(),
        }
    }
}

/// Run-level statistics.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Scanned root
    pub root: String,
    /// Simulate or apply
    pub mode: ExecutionMode,
    /// Files considered
    pub files_scanned: usize,
    /// Hard-linked entries dropped
    pub hardlinks_removed: usize,
    /// Groups formed by size and name
    pub candidate_groups: usize,
    /// Records dropped for having a unique size
    pub eliminated_by_size: usize,
    /// Records dropped for having a unique name within their size
    pub eliminated_by_name: usize,
    /// Full grouping counters
    pub grouping: GroupingStats,
    /// Groups accepted on confidence
    pub groups_accepted: usize,
    /// Groups verified by content
    pub groups_verified: usize,
    /// Groups left unresolved by the verification budget
    pub groups_unverified: usize,
    /// Derived keys of those groups
    pub unverified_groups: Vec<String>,
    /// Verdicts produced
    pub groups_found: usize,
    /// Redundant copies found or removed
    pub duplicates_resolved: usize,
    /// Bytes reclaimable (simulate) or reclaimed (apply)
    pub bytes_reclaimable_or_reclaimed: u64,
    /// Bytes read for fingerprints
    pub bytes_hashed: u64,
    /// Wall-clock seconds
    pub elapsed_seconds: f64,
    /// Whether the run stopped early
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "PD000")
    pub exit_code_name: String,
}

/// A per-file error.
#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    /// Pipeline stage
    pub stage: ErrorStage,
    /// Path involved, if any
    pub path: Option<String>,
    /// Description
    pub message: String,
}

impl From<&RunError> for JsonError {
    fn from(error: &RunError) -> Self {
        Self {
            stage: error.stage,
            path: error.path.as_deref().map(path_string),
            message: error.message.clone(),
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Resolved groups, ordered by original path
    pub groups: Vec<JsonGroup>,
    /// Statistics
    pub summary: JsonSummary,
    /// Per-file errors
    pub errors: Vec<JsonError>,
}

impl JsonOutput {
    /// Build the document for a report and its exit code.
    #[must_use]
    pub fn new(report: &RunReport, exit_code: ExitCode) -> Self {
        Self {
            groups: report.groups.iter().map(JsonGroup::from).collect(),
            summary: JsonSummary {
                root: path_string(&report.root),
                mode: report.mode,
                files_scanned: report.files_scanned,
                hardlinks_removed: report.hardlinks_removed,
                candidate_groups: report.candidate_groups,
                eliminated_by_size: report.grouping.eliminated_by_size,
                eliminated_by_name: report.grouping.eliminated_by_name,
                grouping: report.grouping,
                groups_accepted: report.groups_accepted,
                groups_verified: report.groups_verified,
                groups_unverified: report.groups_unverified,
                unverified_groups: report.unverified_keys.clone(),
                groups_found: report.groups_found,
                duplicates_resolved: report.duplicates_resolved,
                bytes_reclaimable_or_reclaimed: report.bytes_reclaimable_or_reclaimed,
                bytes_hashed: report.bytes_hashed,
                elapsed_seconds: report.elapsed_seconds(),
                interrupted: report.interrupted,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
            errors: report.errors.iter().map(JsonError::from).collect(),
        }
    }

    /// Serialize to a pretty-printed string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        serde_json::to_writer_pretty(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_report;

    #[test]
    fn test_groups_and_summary() {
        let report = sample_report();
        let output = JsonOutput::new(&report, ExitCode::PartialSuccess);

        assert_eq!(output.groups.len(), 1);
        assert_eq!(output.groups[0].total_redundant_bytes, 4000);
        assert_eq!(output.summary.groups_found, 1);
        assert_eq!(output.summary.exit_code, 3);
        assert_eq!(output.summary.exit_code_name, "PD003");
        assert_eq!(output.errors.len(), 1);
    }

    #[test]
    fn test_serialized_field_values() {
        let report = sample_report();
        let json = JsonOutput::new(&report, ExitCode::Success)
            .to_json_pretty()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let group = &value["groups"][0];
        assert_eq!(group["resolution"], "content_verified");
        assert_eq!(group["confidence"], 0.9);
        assert_eq!(group["original_path"], "/photos/IMG_001.jpg");
        assert_eq!(value["summary"]["mode"], "simulate");
        assert_eq!(value["errors"][0]["stage"], "hash");
    }

    #[test]
    fn test_summary_carries_grouping_and_budget() {
        let mut report = sample_report();
        report.grouping.eliminated_by_size = 7;
        report.grouping.eliminated_by_name = 3;
        report.groups_unverified = 1;
        report.unverified_keys = vec!["DSC_0002.jpg".to_string()];

        let json = JsonOutput::new(&report, ExitCode::Success)
            .to_json_pretty()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let summary = &value["summary"];

        assert_eq!(summary["eliminated_by_size"], 7);
        assert_eq!(summary["eliminated_by_name"], 3);
        assert_eq!(summary["grouping"]["total_files"], 5);
        assert_eq!(summary["groups_unverified"], 1);
        assert_eq!(summary["unverified_groups"][0], "DSC_0002.jpg");
    }

    #[test]
    fn test_write_to_ends_with_newline() {
        let mut buffer = Vec::new();
        JsonOutput::new(&sample_report(), ExitCode::Success)
            .write_to(&mut buffer)
            .unwrap();
        assert_eq!(buffer.last(), Some(&b'\n'));
    }
}
