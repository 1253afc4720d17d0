//! Reports describing what a run did.
//!
//! Everything here is `Serialize` so the CLI can print it with `--json` and
//! library callers can log or store it.

use crate::error::PageError;
use crate::merge::MergeReport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one statement page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Transactions extracted from the page.
    pub records: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    /// Why the page contributed nothing, if it failed.
    pub error: Option<PageError>,
}

/// Result of one statement file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Pages reported by the PDF.
    pub page_count: usize,
    pub pages: Vec<PageOutcome>,
    /// Render failures (page `0` means the whole file).
    pub render_errors: Vec<PageError>,
    /// Transactions extracted from the whole file.
    pub records: usize,
}

impl FileReport {
    /// Pages that yielded a parsable answer.
    pub fn succeeded_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.error.is_none()).count()
    }

    /// Pages that failed at any stage, render failures included.
    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.error.is_some()).count() + self.render_errors.len()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    /// Transactions extracted across all files, before deduplication.
    pub extracted: usize,
    pub merge: MergeReport,
    /// Accounts in the saved ledger.
    pub accounts: usize,
    /// Transactions in the saved ledger.
    pub ledger_transactions: usize,
    pub output_path: PathBuf,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub fn failed_pages(&self) -> usize {
        self.files.iter().map(FileReport::failed_pages).sum()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The statements directory did not exist and has been created; add PDFs
    /// and run again.
    SourceDirCreated { path: PathBuf },
    /// The statements directory holds no PDF files.
    NoPdfFiles { path: PathBuf },
    /// Statements were scanned and the ledger saved.
    Completed(RunSummary),
}
