//! Progress-callback trait for per-label pipeline events.
//!
//! Inject an [`Arc<dyn LabelProgressCallback>`] via
//! [`crate::config::DeskConfigBuilder::progress_callback`] to receive events
//! as each label's render and extraction calls settle.
//!
//! Pipelines run concurrently on the Tokio runtime, so every method may be
//! called from several threads at once. Implementations must protect shared
//! mutable state (`Mutex`, atomics).
//!
//! # Example
//!
//! ```rust
//! use zpl_desk::{DeskConfig, LabelId, LabelProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct ReadyCounter(AtomicUsize);
//!
//! impl LabelProgressCallback for ReadyCounter {
//!     fn on_label_ready(&self, _id: LabelId, name: &str, has_metadata: bool) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name} rendered (metadata: {has_metadata})");
//!     }
//! }
//!
//! let config = DeskConfig::builder()
//!     .progress_callback(Arc::new(ReadyCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::item::LabelId;
use std::sync::Arc;

/// Called by the pipeline as labels move through their lifecycle.
///
/// All methods default to no-ops.
pub trait LabelProgressCallback: Send + Sync {
    /// Called once per ingest batch, after filtering.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Markup loaded; render and extraction are about to be issued.
    ///
    /// `name` is the file name only; two labels from different directories
    /// can share it, `id` cannot.
    fn on_label_start(&self, id: LabelId, name: &str) {
        let _ = (id, name);
    }

    /// The rasterizer returned a preview.
    fn on_label_ready(&self, id: LabelId, name: &str, has_metadata: bool) {
        let _ = (id, name, has_metadata);
    }

    /// The rasterizer failed or the file could not be read.
    fn on_label_error(&self, id: LabelId, name: &str) {
        let _ = (id, name);
    }

    /// Called once every pipeline of the batch has settled.
    fn on_batch_complete(&self, total: usize, ready: usize) {
        let _ = (total, ready);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl LabelProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DeskConfig`].
pub type ProgressCallback = Arc<dyn LabelProgressCallback>;
