//! Insight generator: a finished ledger → a Markdown analysis from the
//! Summary Service.
//!
//! Runs only after the batch has produced its ledger and only reads it.
//! Every failure here becomes an [`InsightOutcome::Failed`]; nothing in this
//! module can turn a successful extraction into an error.

use crate::config::ExtractionConfig;
use crate::error::InsightError;
use crate::output::{InsightOutcome, InsightReport, Ledger};
use crate::pipeline::llm::call_with_retry;
use crate::progress::ExtractionProgressCallback;
use crate::prompts::INSIGHT_PROMPT;
use crate::service::{SummaryRequest, SummaryService};
use std::time::Instant;
use tracing::{info, warn};

/// Ask the Summary Service about `ledger`.
///
/// An empty ledger is skipped without any service call.
pub async fn generate_insights(
    service: &dyn SummaryService,
    ledger: &Ledger,
    config: &ExtractionConfig,
) -> InsightOutcome {
    if ledger.is_empty() {
        info!("Ledger is empty; skipping insights");
        return InsightOutcome::Skipped;
    }

    let progress = config.progress_callback.as_deref();
    if let Some(cb) = progress {
        cb.on_insight_start(ledger.len());
    }

    match request_report(service, ledger, config).await {
        Ok(report) => {
            if let Some(cb) = progress {
                cb.on_insight_complete(report.text.len());
            }
            InsightOutcome::Generated(report)
        }
        Err(e) => {
            warn!("Insight generation failed: {}", e);
            if let Some(cb) = progress {
                cb.on_insight_error(&e.to_string());
            }
            InsightOutcome::Failed(e)
        }
    }
}

async fn request_report(
    service: &dyn SummaryService,
    ledger: &Ledger,
    config: &ExtractionConfig,
) -> Result<InsightReport, InsightError> {
    let start = Instant::now();
    let transactions_json = serde_json::to_string_pretty(ledger)
        .map_err(|e| InsightError::Serialization(e.to_string()))?;
    let instruction = config.insight_prompt.as_deref().unwrap_or(INSIGHT_PROMPT);
    let request = SummaryRequest {
        instruction,
        transactions_json: &transactions_json,
    };

    let text = call_with_retry(config, "insights", || service.summarize(request))
        .await
        .map_err(|e| InsightError::ServiceUnavailable {
            attempts: e.attempts,
            source: e.last,
        })?;

    let text = text.trim();
    if text.is_empty() {
        return Err(InsightError::EmptyResponse);
    }

    info!(
        "Insights for {} transaction(s) from {}: {} chars in {:?}",
        ledger.len(),
        service.name(),
        text.len(),
        start.elapsed()
    );

    Ok(InsightReport {
        text: text.to_string(),
        ledger_fingerprint: ledger.fingerprint(),
        transaction_count: ledger.len(),
    })
}
