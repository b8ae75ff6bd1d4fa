//! Batch aggregator: every document through the pipeline, in input order,
//! merged into one date-ordered [`Ledger`].
//!
//! Documents are processed one at a time. This bounds load on the Extraction
//! Service and keeps the progress signal monotonic: the `processed` count
//! passed to the callback grows by one per document, from 1 to `total`.
//!
//! Under [`BatchPolicy::AllOrNothing`] the first failing document aborts the
//! batch and everything extracted so far is discarded. Under
//! [`BatchPolicy::SkipFailed`] the failure is recorded in that document's
//! [`DocumentReport`] and the batch moves on.

use crate::config::{BatchPolicy, ExtractionConfig};
use crate::error::{DocumentError, LedgerError};
use crate::media::InputDocument;
use crate::output::{BatchOutput, DocumentReport, Ledger, Transaction};
use crate::pipeline::rasterize::{self, Frame};
use crate::pipeline::{llm, validate};
use crate::progress::{ExtractionProgressCallback, NoopProgressCallback};
use crate::service::ExtractionService;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One document's trip through rasterise → invoke → validate.
///
/// Lives only until its outcome is folded into the batch.
pub(crate) struct DocumentJob<'a> {
    index: usize,
    document: &'a InputDocument,
    frames: Vec<Frame>,
    started: Instant,
}

/// What a finished job contributes to the batch.
struct JobOutcome {
    transactions: Vec<Transaction>,
    report: DocumentReport,
}

impl<'a> DocumentJob<'a> {
    pub(crate) fn new(index: usize, document: &'a InputDocument) -> Self {
        Self {
            index,
            document,
            frames: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Run the job. On failure the report built so far comes back with the error.
    async fn run(
        mut self,
        service: &dyn ExtractionService,
        config: &ExtractionConfig,
    ) -> Result<JobOutcome, (DocumentReport, DocumentError)> {
        match self.extract(service, config).await {
            Ok(validated) => {
                let report = self.report(validated.transactions.len(), validated.dropped, None);
                Ok(JobOutcome {
                    transactions: validated.transactions,
                    report,
                })
            }
            Err(e) => {
                let report = self.report(0, 0, Some(format!("{}: {}", e.kind(), e)));
                Err((report, e))
            }
        }
    }

    async fn extract(
        &mut self,
        service: &dyn ExtractionService,
        config: &ExtractionConfig,
    ) -> Result<validate::Validated, DocumentError> {
        self.frames = rasterize::rasterize(self.document, config).await?;
        debug!(
            "Document {} '{}': {} frame(s)",
            self.index + 1,
            self.document.name,
            self.frames.len()
        );

        let raw = llm::invoke_extraction(service, &self.document.name, &self.frames, config).await?;
        let validated = validate::validate_response(&raw, config.validation_policy)?;
        if validated.dropped > 0 {
            warn!(
                "Document '{}': dropped {} invalid row(s)",
                self.document.name, validated.dropped
            );
        }
        Ok(validated)
    }

    fn report(&self, transactions: usize, dropped: usize, error: Option<String>) -> DocumentReport {
        DocumentReport {
            index: self.index,
            name: self.document.name.clone(),
            mime_type: self.document.mime_type.clone(),
            frame_count: self.frames.len(),
            transaction_count: transactions,
            dropped_rows: dropped,
            duration_ms: self.started.elapsed().as_millis() as u64,
            error,
        }
    }
}

/// Extract and merge every document in `documents`, in order.
///
/// # Errors
/// - [`LedgerError::NoDocuments`] for an empty input list
/// - [`LedgerError::DocumentFailed`] for the first failing document under
///   [`BatchPolicy::AllOrNothing`]; no partial ledger is returned
pub async fn run_batch(
    service: &dyn ExtractionService,
    documents: &[InputDocument],
    config: &ExtractionConfig,
) -> Result<BatchOutput, LedgerError> {
    if documents.is_empty() {
        return Err(LedgerError::NoDocuments);
    }

    let start = Instant::now();
    let total = documents.len();
    let noop = NoopProgressCallback;
    let progress: &dyn ExtractionProgressCallback = match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &noop,
    };

    info!("Extracting {} document(s) via {}", total, service.name());
    progress.on_batch_start(total);

    let mut merged: Vec<Transaction> = Vec::new();
    let mut reports: Vec<DocumentReport> = Vec::with_capacity(total);

    for (index, document) in documents.iter().enumerate() {
        let processed = index + 1;
        progress.on_document_start(index, total, &document.name);

        match DocumentJob::new(index, document).run(service, config).await {
            Ok(outcome) => {
                info!(
                    "Document {}/{} '{}': {} transaction(s)",
                    processed,
                    total,
                    document.name,
                    outcome.transactions.len()
                );
                progress.on_document_complete(
                    processed,
                    total,
                    &document.name,
                    outcome.transactions.len(),
                );
                merged.extend(outcome.transactions);
                reports.push(outcome.report);
            }
            Err((report, err)) => {
                warn!(
                    "Document {}/{} '{}' failed ({}): {}",
                    processed,
                    total,
                    document.name,
                    err.kind(),
                    err
                );
                progress.on_document_error(processed, total, &document.name, &err.to_string());

                match config.batch_policy {
                    BatchPolicy::AllOrNothing => {
                        return Err(LedgerError::DocumentFailed {
                            index,
                            total,
                            name: document.name.clone(),
                            source: err,
                        });
                    }
                    BatchPolicy::SkipFailed => reports.push(report),
                }
            }
        }
    }

    let ledger = Ledger::from_unsorted(merged);
    let output = BatchOutput {
        ledger,
        documents: reports,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Batch complete: {}/{} document(s), {} transaction(s), {}ms",
        output.succeeded(),
        total,
        output.ledger.len(),
        output.total_duration_ms
    );
    progress.on_batch_complete(total, output.succeeded(), output.ledger.len());

    Ok(output)
}
