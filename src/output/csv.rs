//! CSV report for spreadsheets and data analysis.
//!
//! One row per file in a resolved group.
//!
//! # Columns
//!
//! - `group_id`: 1-based group number in report order
//! - `role`: `original` or `redundant`
//! - `path`: File path
//! - `size`: File size in bytes
//! - `resolution`: `confidence_accepted` or `content_verified`
//! - `confidence`: Group confidence
//! - `removed`: Whether apply mode removed the file
//! - `modified`: Last modified time (RFC 3339), `unknown` when unreadable

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::{Resolution, ResolvedGroup};

/// Errors that can occur during CSV output generation.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    Original,
    Redundant,
}

#[derive(Debug, Serialize)]
struct CsvRow {
    group_id: usize,
    role: Role,
    path: String,
    size: u64,
    resolution: Resolution,
    confidence: f64,
    removed: bool,
    modified: String,
}

/// CSV output formatter.
pub struct CsvOutput<'a> {
    groups: &'a [ResolvedGroup],
}

impl<'a> CsvOutput<'a> {
    /// Create a new CSV output formatter.
    #[must_use]
    pub fn new(groups: &'a [ResolvedGroup]) -> Self {
        Self { groups }
    }

    /// Write the CSV output to the given writer.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if writing or serialization fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for (idx, group) in self.groups.iter().enumerate() {
            let rows = std::iter::once((Role::Original, &group.original))
                .chain(group.redundant.iter().map(|p| (Role::Redundant, p)));

            for (role, path) in rows {
                csv_writer.serialize(CsvRow {
                    group_id: idx + 1,
                    role,
                    path: path.to_string_lossy().into_owned(),
                    size: group.size,
                    resolution: group.resolution,
                    confidence: group.confidence.value(),
                    removed: group.removed.contains(path),
                    modified: modified_time(path),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Generate CSV output as a string.
    ///
    /// # Errors
    ///
    /// Returns `CsvOutputError` if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn modified_time(path: &Path) -> String {
    std::fs::symlink_metadata(path)
        .and_then(|m| m.modified())
        .map(|m| DateTime::<Utc>::from(m).to_rfc3339())
        .unwrap_or_else(|_| "unknown".to_string())
}
