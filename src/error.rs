//! Error types for the statement-ledger library.
//!
//! Four error types map onto four failure domains:
//!
//! * [`ServiceError`] — what a collaborator (Extraction or Summary Service)
//!   reports at its boundary: transport failures, timeouts, rate limits,
//!   rejected credentials. Retry decisions are made on this type.
//!
//! * [`DocumentError`] — one input document could not be turned into
//!   transactions (unsupported media, service unavailable, malformed
//!   response). Scoped to that document.
//!
//! * [`LedgerError`] — **Fatal** for the session: a document failed under the
//!   all-or-nothing batch policy, no provider could be configured, bad
//!   configuration. Returned as `Err(LedgerError)` from the `extract*` entry
//!   points; no partial ledger accompanies it.
//!
//! * [`InsightError`] — the analytics summary failed. Never fatal: it is
//!   reported next to a fully usable ledger.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by an Extraction or Summary Service call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Network-level failure (connection refused, reset, DNS).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call did not complete within the configured timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 429 or provider quota exhaustion.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Credentials were rejected (401/403). Retrying will not help.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Any other provider-side failure (5xx, content filter, bad request).
    #[error("provider error: {0}")]
    Provider(String),
}

impl ServiceError {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ServiceError::Auth(_))
    }
}

/// Why a single document produced no transactions.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    /// The declared media kind is neither a raster image nor a PDF.
    #[error("unsupported media type '{mime_type}'")]
    UnsupportedMedia { mime_type: String },

    /// The paginated document could not be decoded or rendered.
    #[error("could not render document: {detail}")]
    RenderFailed { detail: String },

    /// The input could not be read (missing file, failed download).
    #[error("could not read document: {detail}")]
    ReadFailed { detail: String },

    /// The Extraction Service failed at transport or provider level.
    #[error("extraction service unavailable after {attempts} attempt(s): {source}")]
    ServiceUnavailable {
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    /// The service replied but the content violates the transaction schema.
    ///
    /// `raw` keeps the complete response text for diagnostics.
    #[error("malformed extraction response: {reason}")]
    MalformedResponse { reason: String, raw: String },
}

impl DocumentError {
    /// Short, stable name of the failure kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::UnsupportedMedia { .. } => "unsupported_media",
            DocumentError::RenderFailed { .. } => "render_failed",
            DocumentError::ReadFailed { .. } => "read_failed",
            DocumentError::ServiceUnavailable { .. } => "service_unavailable",
            DocumentError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

/// All fatal errors returned by the statement-ledger library.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A document failed and the batch policy does not allow skipping it.
    ///
    /// `index` is 0-based in input order.
    #[error("document {} of {total} ('{name}') failed: {source}", .index + 1)]
    DocumentFailed {
        index: usize,
        total: usize,
        name: String,
        #[source]
        source: DocumentError,
    },

    /// The batch was started without any input document.
    #[error("no documents to process")]
    NoDocuments,

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The insight stage failed; the ledger it was asked about is unaffected.
#[derive(Debug, Clone, Error)]
pub enum InsightError {
    #[error("summary service unavailable after {attempts} attempt(s): {source}")]
    ServiceUnavailable {
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error("summary service returned an empty report")]
    EmptyResponse,

    #[error("could not serialise the ledger for the summary request: {0}")]
    Serialization(String),
}
