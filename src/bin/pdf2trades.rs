//! CLI binary for edgequake-trades.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScanConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_trades::config::{
    DEFAULT_MODEL, DEFAULT_OUTPUT_PATH, DEFAULT_PROVIDER, DEFAULT_SOURCE_DIR,
};
use edgequake_trades::{
    check_setup, run, ProgressCallback, RunOutcome, RunSummary, ScanConfig, ScanProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Terminal progress callback: one bar per statement, one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    total_files: AtomicUsize,
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading ledger…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            total_files: AtomicUsize::new(0),
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full bar style for a statement of `pages` pages.
    fn activate_bar(&self, prefix: String, pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(progress_style);
        self.bar.set_prefix(prefix);
        self.bar.set_length(pages as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ScanProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_files: usize) {
        self.total_files.store(total_files, Ordering::SeqCst);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_files} statement(s)…"))
        ));
    }

    fn on_file_start(&self, file_index: usize, path: &Path, pages: usize) {
        let total = self.total_files.load(Ordering::SeqCst);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.bar.println(format!(
            "{} {}  {}",
            cyan("▸"),
            bold(&name),
            dim(&format!("[{file_index}/{total}]  {pages} page(s)"))
        ));
        self.activate_bar(format!("{file_index}/{total}"), pages);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, records: usize) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{records:>3} trade(s)")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let elapsed = self.page_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        // Page 0 is a whole-file failure, not a rendered page.
        if page_num > 0 {
            self.bar.inc(1);
        }
    }

    fn on_scan_complete(&self, extracted: usize, added: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        let mark = if errors == 0 { green("✔") } else { cyan("⚠") };
        eprintln!(
            "{} {} extracted, {} new{}",
            mark,
            bold(&extracted.to_string()),
            bold(&added.to_string()),
            if errors == 0 {
                String::new()
            } else {
                format!("  ({} page(s) failed)", red(&errors.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Scan ./data and merge into results.json
  pdf2trades

  # Another statements folder and ledger
  pdf2trades --dir ~/statements/2024 --output ~/ledger.json

  # Use a cloud model
  pdf2trades --provider openai --model gpt-4.1-mini

  # Check pdfium and the model backend before a long run
  pdf2trades --check

  # Machine-readable run report
  pdf2trades --json > report.json

PROVIDERS:
  ollama (default)  local; start `ollama serve` and `ollama pull qwen3-vl:8b`
  openai            OPENAI_API_KEY
  anthropic         ANTHROPIC_API_KEY
  gemini            GEMINI_API_KEY

ENVIRONMENT VARIABLES:
  EDGEQUAKE_PROVIDER  Override provider
  EDGEQUAKE_MODEL     Override model ID
  OLLAMA_HOST         Ollama endpoint (default http://localhost:11434)
  PDFIUM_LIB_PATH     Path to libpdfium (file or directory)
  RUST_LOG            Log filter, e.g. edgequake_trades=debug
"#;

/// Extract stock trades from bank statement PDFs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2trades",
    version,
    about = "Extract stock trades from bank statement PDFs using Vision LLMs",
    long_about = "Scan a folder of bank statement PDFs, read every page with a Vision Language \
Model, and merge the extracted trades into a JSON ledger grouped by account. Transactions \
already in the ledger (same reference) are never added twice.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the statement PDFs (created if missing).
    #[arg(long, env = "PDF2TRADES_DIR", default_value = DEFAULT_SOURCE_DIR)]
    dir: PathBuf,

    /// JSON ledger to merge into.
    #[arg(short, long, env = "PDF2TRADES_OUTPUT", default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Vision model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// LLM provider: ollama, openai, anthropic, gemini.
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2TRADES_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Password for encrypted statements.
    #[arg(long, env = "PDF2TRADES_PASSWORD")]
    password: Option<String>,

    /// Path to a text file replacing the extraction prompt.
    #[arg(long, env = "PDF2TRADES_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDF2TRADES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2TRADES_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per page on LLM failure.
    #[arg(long, env = "PDF2TRADES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-page LLM call timeout in seconds.
    #[arg(long, env = "PDF2TRADES_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "PDF2TRADES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2TRADES_NO_PROGRESS")]
    no_progress: bool,

    /// Check pdfium and the model backend, then exit.
    #[arg(long)]
    check: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TRADES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TRADES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs when it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
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

    let cli_cb = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_cb
        .clone()
        .map(|cb| cb as Arc<dyn ScanProgressCallback>);

    let config = build_config(&cli, progress_cb).await?;

    // ── Self-check mode ──────────────────────────────────────────────────
    if cli.check {
        let report = check_setup(&config).await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialise report")?
            );
        } else {
            match report.pdfium_error {
                None => println!("{} pdfium loaded", green("✔")),
                Some(ref e) => println!("{} pdfium: {}", red("✘"), e),
            }
            match (&report.backend_reply, &report.backend_error) {
                (Some(reply), _) => println!(
                    "{} {} / {} answered: {}",
                    green("✔"),
                    report.provider,
                    report.model,
                    dim(reply)
                ),
                (None, Some(e)) => println!("{} {}", red("✘"), e),
                (None, None) => {}
            }
        }
        if !report.is_ready() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Run scan ─────────────────────────────────────────────────────────
    let result = run(&config).await;
    // Early exits and fatal errors never reach `on_scan_complete`.
    if let Some(ref cb) = cli_cb {
        cb.bar.finish_and_clear();
    }
    let outcome = result.context("Scan failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise report")?
        );
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    match outcome {
        RunOutcome::SourceDirCreated { path } => eprintln!(
            "{} Created {}. Put your statement PDFs there and run again.",
            cyan("◆"),
            bold(&path.display().to_string())
        ),
        RunOutcome::NoPdfFiles { path } => eprintln!(
            "{} No PDF files in {}",
            cyan("⚠"),
            bold(&path.display().to_string())
        ),
        RunOutcome::Completed(summary) => print_summary(&summary, show_progress),
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, show_progress: bool) {
    // The progress callback already printed the extracted/added line.
    if !show_progress {
        eprintln!(
            "{} extracted, {} new, {} duplicate(s) skipped",
            summary.extracted, summary.merge.added, summary.merge.duplicates_skipped
        );
        let failed = summary.failed_pages();
        if failed > 0 {
            eprintln!("  {} page(s) failed", failed);
        }
    } else if summary.merge.duplicates_skipped > 0 {
        eprintln!(
            "   {} duplicate(s) skipped",
            dim(&summary.merge.duplicates_skipped.to_string())
        );
    }
    eprintln!(
        "{}  {} account(s), {} transaction(s)  {}ms  →  {}",
        if summary.failed_pages() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        summary.accounts,
        summary.ledger_transactions,
        summary.total_duration_ms,
        bold(&summary.output_path.display().to_string()),
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&summary.total_input_tokens.to_string()),
        dim(&summary.total_output_tokens.to_string()),
    );
}

/// Map CLI args to `ScanConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScanConfig> {
    let mut builder = ScanConfig::builder()
        .source_dir(&cli.dir)
        .output_path(&cli.output)
        .provider_name(&cli.provider)
        .model(&cli.model)
        .dpi(cli.dpi)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
