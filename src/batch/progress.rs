//! Progress tracking for batch extraction.
//!
//! Reporters are called once per finished file, from whichever worker
//! finished it, so they must be `Send + Sync`.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "progress-tracking")]
use indicatif::{ProgressBar, ProgressStyle};

/// Information about the progress of a batch run.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Number of files finished so far, including this one.
    pub completed: usize,
    /// Total number of files in the batch.
    pub total: usize,
    /// File that just finished.
    pub file: PathBuf,
    /// Time elapsed since the batch started.
    pub elapsed: Duration,
}

impl ProgressInfo {
    /// Fraction of files finished (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Estimated time until the remaining files finish, at the current rate.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        if self.completed == 0 || self.completed > self.total {
            return None;
        }
        let per_file = self.elapsed.as_secs_f64() / self.completed as f64;
        Some(Duration::from_secs_f64(
            per_file * (self.total - self.completed) as f64,
        ))
    }

    /// File name of [`Self::file`] without its directory.
    pub fn file_name(&self) -> String {
        self.file.file_name().map_or_else(
            || self.file.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

/// Trait for reporting progress during batch extraction.
pub trait ProgressReporter: Send + Sync {
    /// Called after every file.
    fn report_progress(&self, info: &ProgressInfo);

    /// Called once before the first file.
    fn start(&self, total: usize) {
        let _ = total;
    }

    /// Called once after the last file.
    fn finish(&self, elapsed: Duration) {
        let _ = elapsed;
    }
}

/// Reporter that does nothing.
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn report_progress(&self, _info: &ProgressInfo) {}
}

/// Forwards every report to a closure.
#[derive(Debug)]
pub struct CallbackProgressReporter<F> {
    callback: F,
}

impl<F> CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    /// Create a new callback progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for CallbackProgressReporter<F>
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn report_progress(&self, info: &ProgressInfo) {
        (self.callback)(info);
    }
}

/// Progress bar-based reporter using indicatif.
#[cfg(feature = "progress-tracking")]
#[derive(Debug)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

#[cfg(feature = "progress-tracking")]
impl ProgressBarReporter {
    /// Create a progress bar for `total` files.
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }
}

#[cfg(feature = "progress-tracking")]
impl ProgressReporter for ProgressBarReporter {
    fn report_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.completed as u64);
        self.bar.set_message(info.file_name());
    }

    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn finish(&self, _elapsed: Duration) {
        self.bar.finish_with_message("feature extraction completed");
    }
}
