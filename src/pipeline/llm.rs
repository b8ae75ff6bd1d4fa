//! Extraction invoker: one document's frames → one Extraction Service call.
//!
//! Exactly one request is issued per document, carrying every frame in page
//! order so the service can read transactions that straddle a page break.
//! The returned text is handed to [`crate::pipeline::validate`] untouched
//! apart from trimming surrounding whitespace.
//!
//! ## Retry Strategy
//!
//! Transport failures, timeouts and 429s are retried with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`): 500 ms → 1 s → 2 s with the
//! defaults. Rejected credentials are not retried. Each attempt is bounded
//! by `api_timeout_secs`.

use crate::config::ExtractionConfig;
use crate::error::{DocumentError, ServiceError};
use crate::pipeline::rasterize::Frame;
use crate::prompts::EXTRACTION_PROMPT;
use crate::schema::transaction_array_schema;
use crate::service::{ExtractionRequest, ExtractionService};
use std::future::Future;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Final failure of a retried call: attempts made and the last error seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RetryExhausted {
    pub attempts: u32,
    pub last: ServiceError,
}

/// Run `call` until it succeeds, fails non-retryably, or retries run out.
///
/// `label` identifies the call in log lines ("'march.pdf'", "insights").
pub(crate) async fn call_with_retry<F, Fut>(
    config: &ExtractionConfig,
    label: &str,
    mut call: F,
) -> Result<String, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ServiceError>>,
{
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let backoff = config.backoff_ms(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let outcome = match timeout(limit, call()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(err) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, err);
                if !err.is_retryable() || attempt >= config.max_retries {
                    return Err(RetryExhausted {
                        attempts: attempt + 1,
                        last: err,
                    });
                }
            }
        }
        attempt += 1;
    }
}

/// Send all frames of one document to the Extraction Service.
///
/// Returns the response text, trimmed. Zero frames never reach the service;
/// the rasteriser guarantees at least one.
pub async fn invoke_extraction(
    service: &dyn ExtractionService,
    document_name: &str,
    frames: &[Frame],
    config: &ExtractionConfig,
) -> Result<String, DocumentError> {
    let start = Instant::now();
    let instruction = config
        .extraction_prompt
        .as_deref()
        .unwrap_or(EXTRACTION_PROMPT);
    let request = ExtractionRequest {
        instruction,
        schema: transaction_array_schema(),
        frames,
    };

    let label = format!("'{document_name}'");
    let text = call_with_retry(config, &label, || service.extract(request))
        .await
        .map_err(|e| DocumentError::ServiceUnavailable {
            attempts: e.attempts,
            source: e.last,
        })?;

    debug!(
        "{}: {} returned {} chars for {} frame(s) in {:?}",
        label,
        service.name(),
        text.len(),
        frames.len(),
        start.elapsed()
    );
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails `failures` times with `error`, then answers `reply`.
    struct Flaky {
        failures: u32,
        error: ServiceError,
        reply: String,
        calls: AtomicU32,
        seen_frames: Mutex<Vec<usize>>,
    }

    impl Flaky {
        fn new(failures: u32, error: ServiceError, reply: &str) -> Self {
            Self {
                failures,
                error,
                reply: reply.to_string(),
                calls: AtomicU32::new(0),
                seen_frames: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExtractionService for Flaky {
        async fn extract(&self, request: ExtractionRequest<'_>) -> Result<String, ServiceError> {
            self.seen_frames.lock().unwrap().push(request.frames.len());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(self.reply.clone())
            }
        }
    }

    fn fast_config(max_retries: u32) -> ExtractionConfig {
        ExtractionConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .build()
            .unwrap()
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|i| Frame::new("image/jpeg", vec![i as u8])).collect()
    }

    #[tokio::test]
    async fn one_call_with_all_frames() {
        let svc = Flaky::new(0, ServiceError::Provider("x".into()), "  [ ]\n");
        let text = invoke_extraction(&svc, "a.pdf", &frames(3), &fast_config(3))
            .await
            .unwrap();
        assert_eq!(text, "[ ]");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*svc.seen_frames.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let svc = Flaky::new(2, ServiceError::RateLimited("429".into()), "[]");
        let text = invoke_extraction(&svc, "a.pdf", &frames(1), &fast_config(3))
            .await
            .unwrap();
        assert_eq!(text, "[]");
        assert_eq!(svc.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempts() {
        let svc = Flaky::new(10, ServiceError::Transport("reset".into()), "[]");
        let err = invoke_extraction(&svc, "a.pdf", &frames(1), &fast_config(2))
            .await
            .unwrap_err();
        match err {
            DocumentError::ServiceUnavailable { attempts, source } => {
                assert_eq!(attempts, 3);
                assert_eq!(source, ServiceError::Transport("reset".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let svc = Flaky::new(10, ServiceError::Auth("401".into()), "[]");
        let err = invoke_extraction(&svc, "a.pdf", &frames(1), &fast_config(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::ServiceUnavailable { attempts: 1, .. }
        ));
        assert_eq!(svc.calls.load(Ordering::SeqCst), 1);
    }

    struct Stalls;

    #[async_trait]
    impl ExtractionService for Stalls {
        async fn extract(&self, _request: ExtractionRequest<'_>) -> Result<String, ServiceError> {
            sleep(Duration::from_secs(3600)).await;
            Ok("[]".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let config = ExtractionConfig::builder()
            .api_timeout_secs(5)
            .max_retries(0)
            .build()
            .unwrap();
        let err = invoke_extraction(&Stalls, "a.pdf", &frames(1), &config)
            .await
            .unwrap_err();
        match err {
            DocumentError::ServiceUnavailable { source, .. } => {
                assert_eq!(source, ServiceError::Timeout { secs: 5 })
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
