//! Progress-callback trait for per-document extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the batch advances. Documents are processed one at a time, so
//! events arrive in order and the `processed` count passed to
//! `on_document_complete` / `on_document_error` grows by exactly one per
//! document, from 1 to `total`.
//!
//! # Example
//!
//! ```rust
//! use statement_ledger::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl ExtractionProgressCallback for Printer {
//!     fn on_document_complete(&self, processed: usize, total: usize, name: &str, count: usize) {
//!         eprintln!("{processed}/{total} {name}: {count} transactions");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first document is opened.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document is rasterised.
    ///
    /// * `index` — 0-based position; equals the number already processed
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document's transactions have been validated.
    ///
    /// * `processed` — documents finished so far, including this one
    fn on_document_complete(&self, processed: usize, total: usize, name: &str, transactions: usize) {
        let _ = (processed, total, name, transactions);
    }

    /// Called when a document fails. Under the default batch policy this is
    /// the last document event of the batch.
    fn on_document_error(&self, processed: usize, total: usize, name: &str, error: &str) {
        let _ = (processed, total, name, error);
    }

    /// Called once after every document has been attempted, only if the
    /// batch produced a ledger.
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize, transactions: usize) {
        let _ = (total_documents, succeeded, transactions);
    }

    /// Called before the Summary Service is asked for insights.
    fn on_insight_start(&self, transactions: usize) {
        let _ = transactions;
    }

    /// Called with the byte length of a generated insight report.
    fn on_insight_complete(&self, report_len: usize) {
        let _ = report_len;
    }

    /// Called when the insight stage fails. The ledger remains valid.
    fn on_insight_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
