//! Progress reporting for scrape batches.
//!
//! [`ProgressCallback`] keeps the orchestrator independent of how progress
//! is rendered. The CLI plugs in an `indicatif` bar; library callers and
//! tests get [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates while a batch runs.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// behind an `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of places in the batch.
    fn set_total(&self, total: u64);

    /// Advances by `delta` places.
    fn inc(&self, delta: u64);

    /// Shows the place currently being fetched.
    fn set_message(&self, msg: String);

    /// Marks the batch as complete.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
