//! Human-readable report for the terminal.
//!
//! Lists each resolved group with its keeper first, then a summary block.
//! Colours come from `yansi` and are switched off globally by `--no-color`.

use std::io::{self, Write};

use bytesize::ByteSize;
use chrono::{DateTime, Local};
use yansi::Paint;

use crate::duplicates::{ExecutionMode, Resolution, RunReport};

/// Text report formatter.
pub struct TextOutput<'a> {
    report: &'a RunReport,
}

impl<'a> TextOutput<'a> {
    /// Create a formatter for a report.
    #[must_use]
    pub fn new(report: &'a RunReport) -> Self {
        Self { report }
    }

    /// Write the report.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let report = self.report;
        let (verb, marker) = match report.mode {
            ExecutionMode::Simulate => ("reclaimable", "would remove"),
            ExecutionMode::Apply => ("reclaimed", "removed"),
        };

        for (i, group) in report.groups.iter().enumerate() {
            let how = match group.resolution {
                Resolution::ContentVerified => "content verified",
                Resolution::ConfidenceAccepted => "accepted on confidence",
            };
            writeln!(
                writer,
                "{} {} x {} ({}, confidence {})",
                format!("Group {}:", i + 1).bold(),
                group.redundant.len() + 1,
                ByteSize::b(group.size),
                how,
                group.confidence
            )?;
            writeln!(writer, "  {} {}", "keep".green(), group.original.display())?;

            for path in &group.redundant {
                let label = if report.mode == ExecutionMode::Apply && !group.removed.contains(path)
                {
                    "failed".red().to_string()
                } else {
                    marker.yellow().to_string()
                };
                writeln!(writer, "  {} {}", label, path.display())?;
            }
            writeln!(writer)?;
        }

        let finished: DateTime<Local> = Local::now();
        writeln!(writer, "{}", "Summary".bold().underline())?;
        writeln!(writer, "  Root:               {}", report.root.display())?;
        writeln!(writer, "  Mode:               {}", report.mode)?;
        writeln!(writer, "  Files scanned:      {}", report.files_scanned)?;
        if report.hardlinks_removed > 0 {
            writeln!(writer, "  Hard links skipped: {}", report.hardlinks_removed)?;
        }
        writeln!(
            writer,
            "  Candidate groups:   {} ({} accepted, {} verified)",
            report.candidate_groups, report.groups_accepted, report.groups_verified
        )?;
        writeln!(
            writer,
            "  Eliminated:         {} by size, {} by name",
            report.grouping.eliminated_by_size, report.grouping.eliminated_by_name
        )?;
        if report.groups_unverified > 0 {
            writeln!(
                writer,
                "  Unverified groups:  {} (verification budget spent)",
                report.groups_unverified.yellow()
            )?;
        }
        writeln!(writer, "  Duplicate groups:   {}", report.groups_found)?;
        writeln!(writer, "  Duplicates:         {}", report.duplicates_resolved)?;
        writeln!(
            writer,
            "  Space {:<14}{}",
            format!("{verb}:"),
            ByteSize::b(report.bytes_reclaimable_or_reclaimed).green().bold()
        )?;
        writeln!(writer, "  Bytes hashed:       {}", ByteSize::b(report.bytes_hashed))?;
        writeln!(
            writer,
            "  Elapsed:            {:.2}s (finished {})",
            report.elapsed_seconds(),
            finished.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
        )?;

        if !report.errors.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "{} ({})", "Errors".red().bold(), report.errors.len())?;
            for error in &report.errors {
                writeln!(writer, "  {error}")?;
            }
        }

        if !report.unverified_keys.is_empty() {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                "Not verified, left in place (raise --max-verify to check them):".yellow()
            )?;
            for key in &report.unverified_keys {
                writeln!(writer, "  {key}")?;
            }
        }

        if report.interrupted {
            writeln!(writer)?;
            writeln!(
                writer,
                "{}",
                "Interrupted: results cover only the groups processed before cancellation."
                    .yellow()
            )?;
        } else if report.mode == ExecutionMode::Simulate && report.groups_found > 0 {
            writeln!(writer)?;
            writeln!(writer, "Dry run. Re-run with --apply to remove duplicates.")?;
        }

        Ok(())
    }

    /// Render into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if formatting fails.
    pub fn to_string(&self) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
