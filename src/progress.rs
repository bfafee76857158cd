//! Progress reporting.
//!
//! Long-running stages (frame sampling, segment downloads) report through a
//! [`ProgressCallback`]. The library never draws anything itself; the CLI
//! plugs in a progress bar.
//!
//! # Example
//!
//! ```
//! use slidegrab::{ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {} / {:?}", info.operation, info.current, info.total);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The kind of work being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Sampling and analysing video frames.
    FrameSampling,
    /// Downloading media segments.
    SegmentDownload,
}

/// A snapshot of progress for one operation on one label.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub operation: OperationType,
    /// Label being processed.
    pub label: String,
    /// Items processed so far.
    pub current: u64,
    /// Total items expected, if known ahead of time.
    pub total: Option<u64>,
    /// Wall-clock time since the operation started.
    pub elapsed: Duration,
}

/// Receives progress updates.
///
/// Must be [`Send`] and [`Sync`]: segment downloads report from pool
/// threads.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards every notification. Used when no callback is configured.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Sequential progress helper that batches callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    label: String,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        label: &str,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            label: label.to_string(),
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
        }
    }

    /// Record one item; report every `batch_size` items.
    pub(crate) fn advance(&mut self) {
        self.current += 1;
        if self.current % self.batch_size == 0 {
            self.report();
        }
    }

    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            label: self.label.clone(),
            current: self.current,
            total: self.total,
            elapsed: self.start_time.elapsed(),
        });
    }
}
