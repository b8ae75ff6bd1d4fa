//! # statement-ledger
//!
//! Turn bank statements (PDFs, scans, phone photos) into one sorted
//! transaction ledger and a short financial analysis, using Vision Language
//! Models.
//!
//! ## Pipeline Overview
//!
//! ```text
//! documents (in input order, one at a time)
//!  │
//!  ├─ 1. Input      read local file or download from URL
//!  ├─ 2. Rasterise  image → 1 frame; PDF → 1 JPEG per page (pdfium, spawn_blocking)
//!  ├─ 3. Extract    one VLM call per document, all frames, retry/backoff
//!  ├─ 4. Validate   JSON array against the shared transaction schema
//!  └─ 5. Merge      concatenate, stable-sort by date
//!        │
//!        └─ 6. Insights   Markdown analysis of the ledger (failure-isolated)
//! ```
//!
//! The default policy is all-or-nothing: if any document fails, the session
//! fails and no partial ledger is returned. Insight failures never affect the
//! ledger.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use statement_ledger::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let output = extract(&["january.pdf", "february.png"], &config).await?;
//!     for t in output.ledger() {
//!         println!("{} {:>10.2} {}", t.date, t.amount, t.description);
//!     }
//!     if let Some(report) = output.insights.report() {
//!         println!("{}", report.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom services
//!
//! The pipeline talks to the model only through [`ExtractionService`] and
//! [`SummaryService`]. Pass your own implementations to
//! [`ExtractionSession::with_services`] to use a different backend.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `stmt2ledger` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod insight;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod schema;
pub mod service;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchPolicy, ExtractionConfig, ExtractionConfigBuilder, ValidationPolicy};
pub use error::{DocumentError, InsightError, LedgerError, ServiceError};
pub use export::{to_csv_string, write_csv, write_csv_file};
pub use media::InputDocument;
pub use output::{
    BatchOutput, CategoryTotal, DocumentReport, InsightOutcome, InsightReport, Ledger,
    LedgerStats, SessionOutput, Transaction,
};
pub use pipeline::rasterize::Frame;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::LlmService;
pub use service::{ExtractionRequest, ExtractionService, SummaryRequest, SummaryService};
pub use session::{extract, extract_sync, ExtractionSession};
