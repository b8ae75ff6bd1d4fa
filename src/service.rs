//! Collaborator boundaries: the Extraction Service and the Summary Service.
//!
//! The pipeline only ever talks to these two traits. [`crate::provider::LlmService`]
//! implements both on top of an `edgequake_llm` provider; tests and embedders
//! can plug in their own implementation (a different vendor SDK, a cache, a
//! canned fixture) without touching the pipeline.

use crate::error::ServiceError;
use crate::pipeline::rasterize::Frame;
use async_trait::async_trait;
use serde_json::Value;

/// Everything the Extraction Service needs for one document.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRequest<'a> {
    /// Natural-language task description and output discipline.
    pub instruction: &'a str,
    /// JSON Schema the response text must conform to.
    pub schema: &'a Value,
    /// Page images in document order, to be considered jointly.
    pub frames: &'a [Frame],
}

/// Everything the Summary Service needs for one ledger.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub instruction: &'a str,
    /// The ledger serialised as a JSON array.
    pub transactions_json: &'a str,
}

/// Structured extraction from page images.
///
/// Implementations return the service's text verbatim; parsing and schema
/// checks happen in the pipeline.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, ServiceError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "extraction"
    }
}

/// Free-text analysis of a transaction list.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn summarize(&self, request: SummaryRequest<'_>) -> Result<String, ServiceError>;

    fn name(&self) -> &str {
        "summary"
    }
}
