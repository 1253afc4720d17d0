//! Run driver: statements directory in, merged ledger out.
//!
//! ## Flow
//!
//! ```text
//! source dir ──▶ discover PDFs ──▶ for each file (in name order)
//!                                     render ──▶ for each page (in order)
//!                                                  encode ──▶ VLM ──▶ normalise ──▶ coerce
//!            ledger ──▶ load ───────────────────────────────────────┐
//!                                                                   ▼
//!                                               merge(existing, extracted) ──▶ save
//! ```
//!
//! Files and pages are processed strictly one after another; each extraction
//! call completes before the next page starts. Every page-level failure is
//! recorded in the [`FileReport`] and the run moves on, so whatever was
//! extracted always reaches the ledger.

use crate::config::ScanConfig;
use crate::error::{PageError, TradesError};
use crate::merge::merge_with_report;
use crate::model::{transaction_count, Transaction};
use crate::output::{FileReport, PageOutcome, RunOutcome, RunSummary};
use crate::pipeline::{coerce, encode, llm, render};
use crate::store;
use edgequake_llm::{LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Scan the configured statements directory and merge the results into the
/// ledger.
///
/// # Returns
/// * [`RunOutcome::SourceDirCreated`] — the directory was missing and has
///   been created; nothing else happened.
/// * [`RunOutcome::NoPdfFiles`] — nothing to scan; the ledger is untouched.
/// * [`RunOutcome::Completed`] — the ledger was saved, even if some pages or
///   files failed (see [`RunSummary::failed_pages`]).
///
/// # Errors
/// Only fatal conditions: unusable statements directory, provider not
/// configured, ledger not writable.
pub async fn run(config: &ScanConfig) -> Result<RunOutcome, TradesError> {
    let total_start = Instant::now();
    let source = config.source_dir.as_path();

    // ── Step 1: Statements directory ─────────────────────────────────────
    if !ensure_source_dir(source).await? {
        info!(
            "Created {}; place statement PDFs there and run again",
            source.display()
        );
        return Ok(RunOutcome::SourceDirCreated {
            path: source.to_path_buf(),
        });
    }

    let statements = discover_statements(source).await?;
    if statements.is_empty() {
        info!("No PDF files found in {}", source.display());
        return Ok(RunOutcome::NoPdfFiles {
            path: source.to_path_buf(),
        });
    }
    info!("Found {} statement(s) in {}", statements.len(), source.display());

    // ── Step 2: Prior ledger + provider ──────────────────────────────────
    let existing = store::load_ledger_or_empty(&config.output_path).await;
    let provider = resolve_provider(config)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_start(statements.len());
    }

    // ── Step 3: Extract every statement ──────────────────────────────────
    let mut files = Vec::with_capacity(statements.len());
    let mut incoming: Vec<Transaction> = Vec::new();
    for (i, path) in statements.iter().enumerate() {
        let (report, mut transactions) = extract_statement(&provider, path, i + 1, config).await;
        incoming.append(&mut transactions);
        files.push(report);
    }

    // ── Step 4: Merge and persist ────────────────────────────────────────
    let outcome = merge_with_report(&existing, &incoming);
    store::save_ledger(&config.output_path, &outcome.groups).await?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_complete(incoming.len(), outcome.report.added);
    }

    let summary = RunSummary {
        extracted: incoming.len(),
        accounts: outcome.groups.len(),
        ledger_transactions: transaction_count(&outcome.groups),
        output_path: config.output_path.clone(),
        total_input_tokens: sum_pages(&files, |p| p.input_tokens),
        total_output_tokens: sum_pages(&files, |p| p.output_tokens),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        merge: outcome.report,
        files,
    };

    info!(
        "Run complete: {} extracted, {} added, {} duplicates, {}ms",
        summary.extracted,
        summary.merge.added,
        summary.merge.duplicates_skipped,
        summary.total_duration_ms
    );

    Ok(RunOutcome::Completed(summary))
}

/// Blocking wrapper around [`run`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(config: &ScanConfig) -> Result<RunOutcome, TradesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TradesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run(config))
}

/// List the PDF files directly inside `dir`, sorted by file name.
///
/// The extension match is case-insensitive; subdirectories are not searched.
pub async fn discover_statements(dir: &Path) -> Result<Vec<PathBuf>, TradesError> {
    let unreadable = |source: std::io::Error| TradesError::SourceDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(unreadable)?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }
        // Follows symlinks, unlike `entry.file_type()`.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => found.push(path),
            Ok(_) => debug!("Skipping non-file {}", path.display()),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(found)
}

/// Extract all transactions from one statement.
///
/// Never fails: render errors, blank replies, malformed JSON and failed calls
/// are recorded in the returned [`FileReport`].
pub async fn extract_statement(
    provider: &Arc<dyn LLMProvider>,
    pdf_path: &Path,
    file_index: usize,
    config: &ScanConfig,
) -> (FileReport, Vec<Transaction>) {
    info!("Processing {}", pdf_path.display());

    let rendered = render::render_document(pdf_path, config).await;
    let total_pages = rendered.page_count;

    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(file_index, pdf_path, rendered.pages.len());
        for failure in &rendered.failures {
            cb.on_page_error(failure.page(), total_pages, &failure.to_string());
        }
    }

    let mut pages = Vec::with_capacity(rendered.pages.len());
    let mut transactions = Vec::new();

    for (idx, image) in &rendered.pages {
        let page_num = idx + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages);
        }

        let started = Instant::now();
        let reply = match encode::encode_page(image) {
            Ok(data) => llm::request_page(provider, page_num, data, config).await,
            Err(e) => Err(PageError::RenderFailed {
                page: page_num,
                detail: format!("image encoding failed: {e}"),
            }),
        };
        let (outcome, mut found) = settle_page(page_num, reply, started);

        if let Some(ref cb) = config.progress_callback {
            match &outcome.error {
                None => cb.on_page_complete(page_num, total_pages, outcome.records),
                Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
            }
        }

        transactions.append(&mut found);
        pages.push(outcome);
    }

    info!(
        "{}: {} transaction(s) from {} page(s)",
        pdf_path.display(),
        transactions.len(),
        pages.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_complete(pdf_path, transactions.len());
    }

    let report = FileReport {
        path: pdf_path.to_path_buf(),
        page_count: total_pages,
        pages,
        render_errors: rendered.failures,
        records: transactions.len(),
    };
    (report, transactions)
}

/// Turn a page's extraction-call result into its outcome and transactions.
fn settle_page(
    page_num: usize,
    reply: Result<llm::PageReply, PageError>,
    started: Instant,
) -> (PageOutcome, Vec<Transaction>) {
    let mut outcome = PageOutcome {
        page_num,
        records: 0,
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: None,
    };

    let parsed = reply.and_then(|reply| {
        outcome.input_tokens = reply.input_tokens;
        outcome.output_tokens = reply.output_tokens;
        outcome.retries = reply.retries;
        coerce::interpret_response(&reply.text, page_num)
    });
    outcome.duration_ms = started.elapsed().as_millis() as u64;

    match parsed {
        Ok(found) => {
            debug!("Page {}: {} transaction(s)", page_num, found.len());
            outcome.records = found.len();
            (outcome, found)
        }
        Err(e) => {
            warn!("{}", e);
            outcome.error = Some(e);
            (outcome, Vec::new())
        }
    }
}

/// Outcome of the `--check` self-test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupReport {
    pub provider: String,
    pub model: String,
    /// Why pdfium could not be bound, if it could not.
    pub pdfium_error: Option<String>,
    pub backend_reply: Option<String>,
    pub backend_error: Option<String>,
}

impl SetupReport {
    /// Both the renderer and the model backend are usable.
    pub fn is_ready(&self) -> bool {
        self.pdfium_error.is_none() && self.backend_error.is_none()
    }
}

/// Verify that statements can be rendered and the model answers.
pub async fn check_setup(config: &ScanConfig) -> SetupReport {
    let pdfium_error = tokio::task::spawn_blocking(render::check_pdfium)
        .await
        .unwrap_or_else(|e| Err(format!("pdfium check panicked: {e}")))
        .err();

    let backend = match resolve_provider(config) {
        Ok(provider) => llm::check_backend(&provider, config).await,
        Err(e) => Err(e),
    };

    let (backend_reply, backend_error) = match backend {
        Ok(reply) => (Some(reply), None),
        Err(e) => (None, Some(e.to_string())),
    };

    SetupReport {
        provider: config.provider_name.clone(),
        model: config.model.clone(),
        pdfium_error,
        backend_reply,
        backend_error,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Make sure the statements directory exists.
///
/// Returns `false` when it had to be created, `true` when it was already there.
async fn ensure_source_dir(dir: &Path) -> Result<bool, TradesError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => Ok(true),
        Ok(_) => Err(TradesError::SourceDirUnreadable {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| TradesError::SourceDirCreateFailed {
                    path: dir.to_path_buf(),
                    source,
                })?;
            Ok(false)
        }
        Err(source) => Err(TradesError::SourceDirUnreadable {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// Use the caller's provider if given, otherwise build the named one.
fn resolve_provider(config: &ScanConfig) -> Result<Arc<dyn LLMProvider>, TradesError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    ProviderFactory::create_llm_provider(&config.provider_name, &config.model).map_err(|e| {
        TradesError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!(
                "{e}\nFor Ollama, start the daemon and set OLLAMA_HOST if it is not on \
                 localhost:11434. Cloud providers read their API key from the environment \
                 (OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY)."
            ),
        }
    })
}

fn sum_pages(files: &[FileReport], field: impl Fn(&PageOutcome) -> usize) -> u64 {
    files
        .iter()
        .flat_map(|f| f.pages.iter())
        .map(|p| field(p) as u64)
        .sum()
}
