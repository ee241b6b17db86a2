//! Progress reporting using indicatif.
//!
//! The engine reports through the [`ProgressCallback`] trait so that the
//! library stays usable without a terminal. [`Progress`] is the terminal
//! implementation used by the binary: a spinner while scanning and a bar
//! over candidate groups while verifying.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase name reported while walking the tree.
pub const PHASE_SCAN: &str = "scanning";

/// Phase name reported while scoring, verifying and acting on groups.
pub const PHASE_VERIFY: &str = "verifying";

/// Progress callback for the detection pipeline.
///
/// Implementations must be thread-safe: verification reports from
/// worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - [`PHASE_SCAN`] or [`PHASE_VERIFY`]
    /// * `total` - Number of items, 0 when unknown
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed.
    ///
    /// # Arguments
    ///
    /// * `current` - Items processed so far (1-based)
    /// * `path` - Path being processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to replace the status message.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress reporter.
pub struct Progress {
    multi: MultiProgress,
    scan: Mutex<Option<ProgressBar>>,
    verify: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use photodedup::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            scan: Mutex::new(None),
            verify: Mutex::new(None),
            quiet,
        }
    }

    fn scan_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}] {pos} files")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn verify_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} groups ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn active_bar(&self) -> Option<ProgressBar> {
        let verify = self.verify.lock().ok().and_then(|guard| guard.clone());
        verify.or_else(|| self.scan.lock().ok().and_then(|guard| guard.clone()))
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        match phase {
            PHASE_SCAN => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::scan_style());
                pb.set_message("Scanning");
                pb.enable_steady_tick(Duration::from_millis(100));
                if let Ok(mut slot) = self.scan.lock() {
                    *slot = Some(pb);
                }
            }
            PHASE_VERIFY => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::verify_style());
                pb.set_message("Verifying");
                if let Ok(mut slot) = self.verify.lock() {
                    *slot = Some(pb);
                }
            }
            other => log::debug!("Ignoring unknown progress phase '{}'", other),
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_position(current as u64);
            pb.set_message(truncate_path(path, 40));
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }

        let (slot, message) = match phase {
            PHASE_SCAN => (&self.scan, "Scan complete"),
            PHASE_VERIFY => (&self.verify, "Verification complete"),
            _ => return,
        };
        if let Some(pb) = slot.lock().ok().and_then(|mut guard| guard.take()) {
            pb.finish_with_message(message);
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        if let Some(pb) = self.active_bar() {
            pb.set_message(message.to_string());
        }
    }
}

/// Shorten a path for display, keeping the file name.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name_len = file_name.chars().count();
    if name_len + 4 > max_len {
        let tail: String = file_name
            .chars()
            .skip(name_len.saturating_sub(max_len.saturating_sub(3)))
            .collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
