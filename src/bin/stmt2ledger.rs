//! CLI binary for statement-ledger.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, writes the ledger and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use statement_ledger::{
    write_csv, write_csv_file, BatchPolicy, ExtractionConfig, ExtractionProgressCallback,
    ExtractionSession, InsightOutcome, LedgerStats, ProgressCallback, SessionOutput,
    ValidationPolicy,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over documents, one log line per
/// finished document, and a spinner while insights are generated.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the document currently being processed.
    current_start: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current_start: Mutex::new(None),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.current_start
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting transactions from {total} document(s)…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        if let Ok(mut s) = self.current_start.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, processed: usize, total: usize, name: &str, transactions: usize) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            green("✓"),
            processed,
            total,
            name,
            dim(&format!("{transactions:>4} transactions")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(processed as u64);
    }

    fn on_document_error(&self, processed: usize, total: usize, name: &str, error: &str) {
        let secs = self.elapsed_secs();

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<32}  {}  {}",
            red("✗"),
            processed,
            total,
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(processed as u64);
    }

    fn on_batch_complete(&self, total: usize, succeeded: usize, transactions: usize) {
        let failed = total.saturating_sub(succeeded);
        self.bar.println(if failed == 0 {
            format!(
                "{} {} transactions from {} document(s)",
                green("✔"),
                bold(&transactions.to_string()),
                total
            )
        } else {
            format!(
                "{} {} transactions from {}/{} document(s)  ({} skipped)",
                cyan("⚠"),
                bold(&transactions.to_string()),
                succeeded,
                total,
                red(&failed.to_string()),
            )
        });
    }

    fn on_insight_start(&self, _transactions: usize) {
        self.bar.set_prefix("Analysing");
        self.bar.set_message("generating insights…");
    }

    fn on_insight_complete(&self, report_len: usize) {
        self.bar.println(format!(
            "{} insights ready  {}",
            green("✔"),
            dim(&format!("{report_len} chars"))
        ));
    }

    fn on_insight_error(&self, error: &str) {
        self.bar
            .println(format!("{} insights unavailable: {}", cyan("⚠"), red(error)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Print the ledger as CSV on stdout
  stmt2ledger january.pdf february.pdf

  # Write CSV and the insight report to files
  stmt2ledger statements/*.pdf -o ledger.csv --insights-output insights.md

  # Photos of paper statements, keep going past unreadable ones
  stmt2ledger page1.jpg page2.jpg --skip-failed

  # Structured JSON (ledger, per-document reports, insights)
  stmt2ledger --json march.pdf > march.json

  # Use a specific model
  stmt2ledger --provider anthropic --model claude-sonnet-4-20250514 march.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (default: ./ then system library)
"#;

/// Extract a sorted transaction ledger from bank statements using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "stmt2ledger",
    version,
    about = "Extract a sorted transaction ledger from bank statements using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Statement files (PDF or image) or HTTP/HTTPS URLs, processed in order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the ledger (CSV, or JSON with --json) to this file instead of stdout.
    #[arg(short, long, env = "STMT2LEDGER_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON instead of CSV (to stdout, or to --output).
    #[arg(long, env = "STMT2LEDGER_JSON")]
    json: bool,

    /// Write the insight report (Markdown) to this file.
    #[arg(long, env = "STMT2LEDGER_INSIGHTS_OUTPUT")]
    insights_output: Option<PathBuf>,

    /// Skip the insight report.
    #[arg(long, env = "STMT2LEDGER_NO_INSIGHTS")]
    no_insights: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// PDF page render scale (0.5–4.0).
    #[arg(long, env = "STMT2LEDGER_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality for rendered PDF pages (1–100).
    #[arg(long, env = "STMT2LEDGER_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Retries per service call on transient failure.
    #[arg(long, env = "STMT2LEDGER_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "STMT2LEDGER_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "STMT2LEDGER_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// PDF user password for encrypted statements.
    #[arg(long, env = "STMT2LEDGER_PASSWORD")]
    password: Option<String>,

    /// Drop invalid rows instead of rejecting the whole document.
    #[arg(long, env = "STMT2LEDGER_LENIENT")]
    lenient: bool,

    /// Leave failed documents out of the ledger instead of aborting.
    #[arg(long, env = "STMT2LEDGER_SKIP_FAILED")]
    skip_failed: bool,

    /// Disable progress bar.
    #[arg(long, env = "STMT2LEDGER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STMT2LEDGER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STMT2LEDGER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and session ─────────────────────────────────────────
    let cli_cb = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);

    let config = build_config(&cli, progress_cb)?;
    let session = ExtractionSession::new(config).context("Could not configure the LLM provider")?;

    // ── Run extraction ───────────────────────────────────────────────────
    let result = run(&session, &cli).await;

    // Clear the bar before anything goes to stdout.
    if let Some(ref cb) = cli_cb {
        cb.bar.finish_and_clear();
    }
    let output = result?;

    // ── Write results ────────────────────────────────────────────────────
    write_ledger(&output, &cli).await?;

    if let (Some(ref path), Some(report)) = (&cli.insights_output, output.insights.report()) {
        tokio::fs::write(path, &report.text)
            .await
            .with_context(|| format!("Failed to write insights to {}", path.display()))?;
    }

    if !cli.quiet {
        print_summary(&output, &cli);
    }

    Ok(())
}

async fn run(session: &ExtractionSession, cli: &Cli) -> Result<SessionOutput> {
    let documents = session
        .resolve_inputs(&cli.inputs)
        .await
        .context("Failed to read input")?;
    let batch = session
        .extract_ledger(&documents)
        .await
        .context("Extraction failed")?;
    let insights = if cli.no_insights {
        InsightOutcome::Skipped
    } else {
        session.generate_insights(&batch.ledger).await
    };
    Ok(SessionOutput { batch, insights })
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .render_scale(cli.scale)
        .jpeg_quality(cli.jpeg_quality)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .validation_policy(if cli.lenient {
            ValidationPolicy::Lenient
        } else {
            ValidationPolicy::Strict
        })
        .batch_policy(if cli.skip_failed {
            BatchPolicy::SkipFailed
        } else {
            BatchPolicy::AllOrNothing
        });

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write the ledger in the selected format to `--output`, or to stdout.
async fn write_ledger(output: &SessionOutput, cli: &Cli) -> Result<()> {
    match (&cli.output, cli.json) {
        (Some(path), true) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            tokio::fs::write(path, render_json(output)?)
                .await
                .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
        }
        (Some(path), false) => {
            write_csv_file(output.ledger(), path)
                .await
                .context("Failed to write CSV")?;
        }
        (None, true) => println!("{}", render_json(output)?),
        (None, false) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_csv(output.ledger(), &mut handle).context("Failed to write to stdout")?;
            handle.flush().ok();
        }
    }
    Ok(())
}

fn render_json(output: &SessionOutput) -> Result<String> {
    let insights = match &output.insights {
        InsightOutcome::Skipped => serde_json::Value::Null,
        InsightOutcome::Generated(report) => serde_json::to_value(report)?,
        InsightOutcome::Failed(e) => serde_json::json!({ "error": e.to_string() }),
    };
    let value = serde_json::json!({
        "transactions": output.ledger(),
        "stats": output.ledger().stats(),
        "documents": output.batch.documents,
        "total_duration_ms": output.batch.total_duration_ms,
        "insights": insights,
    });
    serde_json::to_string_pretty(&value).context("Failed to serialise output")
}

fn print_summary(output: &SessionOutput, cli: &Cli) {
    let stats: LedgerStats = output.ledger().stats();
    let period = match (stats.first_date, stats.last_date) {
        (Some(a), Some(b)) => format!("{a} → {b}"),
        _ => "no transactions".to_string(),
    };

    eprintln!();
    eprintln!("{}  {}", bold("Period"), period);
    eprintln!(
        "   income {}   spending {}   net {}",
        green(&format!("{:.2}", stats.total_income)),
        red(&format!("{:.2}", stats.total_spending)),
        bold(&format!("{:.2}", stats.net)),
    );
    for c in stats.spending_by_category.iter().take(5) {
        eprintln!("   {:<20} {}", c.category, dim(&format!("{:>10.2}", c.total)));
    }
    if let Some(ref path) = cli.output {
        eprintln!("   {}  {}", dim("ledger →"), bold(&path.display().to_string()));
    }

    match &output.insights {
        InsightOutcome::Generated(report) => {
            if cli.insights_output.is_none() && !cli.json {
                eprintln!();
                eprintln!("{}", report.text);
            }
        }
        InsightOutcome::Failed(e) => {
            eprintln!("{} insights unavailable: {}", cyan("⚠"), e);
        }
        InsightOutcome::Skipped => {}
    }
    eprintln!(
        "{}",
        dim(&format!(
            "{} document(s), {}ms total",
            output.batch.documents.len(),
            output.batch.total_duration_ms
        ))
    );
}
