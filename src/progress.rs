//! Progress-callback trait for batch conversion events.
//!
//! Attach an [`Arc<dyn BatchProgressCallback>`] to a
//! [`crate::worker::ConverterWorker`] to observe every batch it runs. The CLI
//! uses it to drive a terminal progress bar; a server could forward the same
//! events to a metrics sink or a WebSocket.
//!
//! # Example
//!
//! ```rust
//! use pdf2md_gateway::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_complete(&self, _index: usize, _total: usize, _markdown_len: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::sync::Arc;

/// Called by the worker as it processes a batch.
///
/// Items of one batch may run concurrently when the engine allows it, so
/// implementations must be `Send + Sync` and synchronise their own state.
/// Every method defaults to a no-op. Indices are 0-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first item starts.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before item `index` is handed to the engine.
    fn on_item_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when item `index` converted; `markdown_len` is in bytes.
    fn on_item_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let _ = (index, total, markdown_len);
    }

    /// Called when item `index` failed.
    fn on_item_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every item has been attempted.
    fn on_batch_complete(&self, total: usize, converted: usize) {
        let _ = (total, converted);
    }
}

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Shared handle stored by the worker.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
