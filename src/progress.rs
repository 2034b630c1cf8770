//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the batch works through each file. The CLI renders them as an
//! `indicatif` bar with one coloured line per file; library users can forward
//! them anywhere.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{BatchProgressCallback, ConversionConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_job_complete(&self, index: usize, total: usize, destination: &Path) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} → {}", index, total, destination.display());
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the batch orchestrator as it processes each file.
///
/// Jobs run one at a time, so calls never overlap; the `Send + Sync` bound
/// only lets the callback live inside a shareable config. All methods default
/// to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before the first job.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a job's first tool runs. `index` is 1-based.
    fn on_job_start(&self, index: usize, total_files: usize, source: &Path) {
        let _ = (index, total_files, source);
    }

    /// Called when a PDF was produced.
    fn on_job_complete(&self, index: usize, total_files: usize, destination: &Path) {
        let _ = (index, total_files, destination);
    }

    /// Called when a job failed at any step.
    fn on_job_error(&self, index: usize, total_files: usize, source: &Path, error: &str) {
        let _ = (index, total_files, source, error);
    }

    /// Called once after every job was attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_success: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_job_start(&self, _index: usize, _total: usize, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _index: usize, _total: usize, _destination: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_error(&self, _index: usize, _total: usize, _source: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.final_success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_job_start(1, 2, Path::new("a.md"));
        cb.on_job_complete(1, 2, Path::new("pdf_output/a.pdf"));
        cb.on_job_error(2, 2, Path::new("b.md"), "typst exited with 1");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_job_start(1, 2, Path::new("a.md"));
        tracker.on_job_complete(1, 2, Path::new("out/a.pdf"));
        tracker.on_job_start(2, 2, Path::new("b.md"));
        tracker.on_job_error(2, 2, Path::new("b.md"), "boom");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
    }
}
