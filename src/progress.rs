//! Progress-callback trait for run lifecycle and polling events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::ProcessorConfigBuilder::progress_callback`] to receive
//! events as the orchestrator uploads, polls and downloads.
//!
//! The orchestrator never draws anything itself: the CLI forwards these
//! events to an indicatif bar, tests count them, and library users can
//! forward them wherever they like.
//!
//! # Example
//!
//! ```rust
//! use mathpix_convert::{ProcessingProgressCallback, ProcessorConfig};
//! use std::sync::Arc;
//!
//! struct PrintPercent;
//!
//! impl ProcessingProgressCallback for PrintPercent {
//!     fn on_progress(&self, percent: f64, pages_done: u32, total_pages: u32) {
//!         eprintln!("{percent:.0}% ({pages_done}/{total_pages} pages)");
//!     }
//! }
//!
//! let config = ProcessorConfig::builder()
//!     .progress_callback(Arc::new(PrintPercent))
//!     .build()
//!     .unwrap();
//! ```

use crate::config::OutputFormat;
use crate::error::DownloadError;
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as a run advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events are purely informational; nothing an
/// implementation does can change the outcome of the run.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called right before the PDF is uploaded.
    fn on_upload_start(&self, pdf_path: &Path) {
        let _ = pdf_path;
    }

    /// Called once the service has accepted the upload.
    fn on_job_submitted(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after every poll that found the job still in progress.
    ///
    /// # Arguments
    /// * `percent`     — completion percentage reported by the service (0–100)
    /// * `pages_done`  — pages processed so far
    /// * `total_pages` — pages in the document (0 until the service knows)
    fn on_progress(&self, percent: f64, pages_done: u32, total_pages: u32) {
        let _ = (percent, pages_done, total_pages);
    }

    /// Called when the job reaches the completed state.
    fn on_processing_complete(&self, job_id: &str) {
        let _ = job_id;
    }

    /// Called after a format has been written to disk.
    fn on_format_saved(&self, format: OutputFormat, path: &Path, bytes: usize) {
        let _ = (format, path, bytes);
    }

    /// Called when a format is skipped because its download failed.
    fn on_format_skipped(&self, error: &DownloadError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessorConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        polls: AtomicUsize,
        saved: AtomicUsize,
        skipped: AtomicUsize,
        last_percent: Mutex<Option<f64>>,
    }

    impl ProcessingProgressCallback for TrackingCallback {
        fn on_progress(&self, percent: f64, _pages_done: u32, _total_pages: u32) {
            self.polls.fetch_add(1, Ordering::SeqCst);
            *self.last_percent.lock().unwrap() = Some(percent);
        }

        fn on_format_saved(&self, _format: OutputFormat, _path: &Path, _bytes: usize) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_format_skipped(&self, _error: &DownloadError) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_upload_start(Path::new("lecture.pdf"));
        cb.on_job_submitted("job-1");
        cb.on_progress(50.0, 3, 6);
        cb.on_processing_complete("job-1");
        cb.on_format_saved(OutputFormat::Mmd, Path::new("notes.mmd"), 12);
        cb.on_format_skipped(&DownloadError::HttpStatus {
            format: OutputFormat::Html,
            status: 500,
        });
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_progress(10.0, 1, 10);
        tracker.on_progress(60.0, 6, 10);
        tracker.on_format_saved(OutputFormat::Mmd, Path::new("a.mmd"), 100);
        tracker.on_format_skipped(&DownloadError::Transport {
            format: OutputFormat::TexZip,
            detail: "connection reset".into(),
        });

        assert_eq!(tracker.polls.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.last_percent.lock().unwrap(), Some(60.0));
        assert_eq!(tracker.saved.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_progress(0.0, 0, 0);
    }
}
