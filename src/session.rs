//! Extraction sessions and the top-level entry points.
//!
//! An [`ExtractionSession`] owns its configuration and its two service
//! handles. Nothing is shared between sessions, so two of them can run in
//! the same process with different providers.
//!
//! A session runs its stages strictly in order: every document is extracted
//! and merged before the insight stage sees the ledger.

use crate::batch;
use crate::config::ExtractionConfig;
use crate::error::LedgerError;
use crate::insight;
use crate::media::InputDocument;
use crate::output::{BatchOutput, InsightOutcome, Ledger, SessionOutput};
use crate::pipeline::input;
use crate::provider::LlmService;
use crate::service::{ExtractionService, SummaryService};
use std::sync::Arc;
use tracing::info;

/// One extraction session: configuration plus resolved services.
#[derive(Clone)]
pub struct ExtractionSession {
    config: ExtractionConfig,
    extraction: Arc<dyn ExtractionService>,
    summary: Arc<dyn SummaryService>,
}

impl ExtractionSession {
    /// Resolve the LLM provider once and use it for both services.
    ///
    /// # Errors
    /// [`LedgerError::ProviderNotConfigured`] when no credentials can be found.
    pub fn new(config: ExtractionConfig) -> Result<Self, LedgerError> {
        let llm = Arc::new(LlmService::from_config(&config)?);
        info!("Session using {}", ExtractionService::name(llm.as_ref()));
        Ok(Self {
            config,
            extraction: llm.clone(),
            summary: llm,
        })
    }

    /// Build a session over caller-supplied services.
    pub fn with_services(
        config: ExtractionConfig,
        extraction: Arc<dyn ExtractionService>,
        summary: Arc<dyn SummaryService>,
    ) -> Self {
        Self {
            config,
            extraction,
            summary,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Read or download every input, in order.
    ///
    /// A failing input is reported like a failing document: with its
    /// position, its name and the cause.
    pub async fn resolve_inputs<S: AsRef<str>>(
        &self,
        inputs: &[S],
    ) -> Result<Vec<InputDocument>, LedgerError> {
        if inputs.is_empty() {
            return Err(LedgerError::NoDocuments);
        }
        let total = inputs.len();
        let mut documents = Vec::with_capacity(total);
        for (index, raw) in inputs.iter().enumerate() {
            let raw = raw.as_ref();
            let document = input::resolve_input(raw, self.config.download_timeout_secs)
                .await
                .map_err(|source| LedgerError::DocumentFailed {
                    index,
                    total,
                    name: raw.to_string(),
                    source,
                })?;
            documents.push(document);
        }
        Ok(documents)
    }

    /// Run the batch and return the merged ledger.
    pub async fn extract_ledger(
        &self,
        documents: &[InputDocument],
    ) -> Result<BatchOutput, LedgerError> {
        batch::run_batch(self.extraction.as_ref(), documents, &self.config).await
    }

    /// Ask for an insight report on `ledger`. Never fails the session.
    pub async fn generate_insights(&self, ledger: &Ledger) -> InsightOutcome {
        insight::generate_insights(self.summary.as_ref(), ledger, &self.config).await
    }

    /// Extract, then analyse.
    ///
    /// Only a batch failure is an `Err`; an insight failure is carried in
    /// [`SessionOutput::insights`] next to the intact ledger.
    pub async fn run(&self, documents: &[InputDocument]) -> Result<SessionOutput, LedgerError> {
        let batch = self.extract_ledger(documents).await?;
        let insights = self.generate_insights(&batch.ledger).await;
        Ok(SessionOutput { batch, insights })
    }
}

/// Extract a ledger and insights from paths or URLs.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(LedgerError)` only for fatal errors: no provider, an
/// unreadable input, or a failing document under the default batch policy.
pub async fn extract<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<SessionOutput, LedgerError> {
    let session = ExtractionSession::new(config.clone())?;
    let documents = session.resolve_inputs(inputs).await?;
    session.run(&documents).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync<S: AsRef<str>>(
    inputs: &[S],
    config: &ExtractionConfig,
) -> Result<SessionOutput, LedgerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LedgerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(inputs, config))
}
