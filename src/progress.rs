//! Progress-callback trait for file and page events during a scan.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to follow a run as
//! it walks the statements directory. The CLI drives an `indicatif` bar from
//! it; library users can forward events to whatever they like.
//!
//! # Example
//!
//! ```rust
//! use edgequake_trades::{ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RecordCounter {
//!     records: AtomicUsize,
//! }
//!
//! impl ScanProgressCallback for RecordCounter {
//!     fn on_page_complete(&self, _page: usize, _total: usize, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RecordCounter { records: AtomicUsize::new(0) });
//! let config = ScanConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the scan driver as it processes statements.
///
/// Files and pages are processed strictly one after another, so events arrive
/// in order. All methods default to no-ops.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once before the first statement is opened.
    fn on_scan_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a statement has been rasterised.
    ///
    /// # Arguments
    /// * `file_index` — 1-indexed position of the file in the run
    /// * `path`       — the statement being processed
    /// * `pages`      — pages rendered (0 when rasterisation failed)
    fn on_file_start(&self, file_index: usize, path: &Path, pages: usize) {
        let _ = (file_index, path, pages);
    }

    /// Called just before the extraction request is sent for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page produced a parsable answer.
    ///
    /// `records` is the number of transactions found (possibly 0).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, records: usize) {
        let _ = (page_num, total_pages, records);
    }

    /// Called when a page contributed nothing because of an error.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called after every page of a statement has been attempted.
    fn on_file_complete(&self, path: &Path, records: usize) {
        let _ = (path, records);
    }

    /// Called once the ledger has been merged and saved.
    ///
    /// # Arguments
    /// * `extracted` — records extracted across all files
    /// * `added`     — records that made it into the ledger
    fn on_scan_complete(&self, extracted: usize, added: usize) {
        let _ = (extracted, added);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        files: AtomicUsize,
        records: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl ScanProgressCallback for TrackingCallback {
        fn on_file_start(&self, _file_index: usize, _path: &Path, _pages: usize) {
            self.files.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, records: usize) {
            self.records.fetch_add(records, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, error: &str) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_scan_start(2);
        cb.on_file_start(1, Path::new("a.pdf"), 3);
        cb.on_page_start(1, 3);
        cb.on_page_complete(1, 3, 4);
        cb.on_page_error(2, 3, "bad json");
        cb.on_file_complete(Path::new("a.pdf"), 4);
        cb.on_scan_complete(4, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_file_start(1, Path::new("jan.pdf"), 2);
        tracker.on_page_complete(1, 2, 5);
        tracker.on_page_error(2, 2, "empty response");
        tracker.on_file_start(2, Path::new("feb.pdf"), 1);
        tracker.on_page_complete(1, 1, 0);

        assert_eq!(tracker.files.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.records.load(Ordering::SeqCst), 5);
        assert_eq!(*tracker.errors.lock().unwrap(), vec!["empty response"]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_scan_start(1);
        cb.on_scan_complete(0, 0);
    }
}
