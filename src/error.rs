//! Error types for the edgequake-trades library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TradesError`] — **Fatal**: the run cannot proceed at all (source
//!   directory unusable, provider not configured, ledger cannot be written).
//!   Returned as `Err(TradesError)` from [`crate::scan::run`].
//!
//! * [`PageError`] — **Non-fatal**: one statement or one page failed (render
//!   glitch, blank model reply, malformed JSON, transient API error). Stored
//!   inside [`crate::output::PageOutcome`] / [`crate::output::FileReport`] so
//!   the rest of the run still contributes to the ledger.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-trades library.
///
/// Page-level failures use [`PageError`] and never surface here.
#[derive(Debug, Error)]
pub enum TradesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The statements directory exists but cannot be listed.
    #[error("Cannot read statements directory '{path}': {source}")]
    SourceDirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The statements directory was missing and could not be created.
    #[error("Cannot create statements directory '{path}': {source}")]
    SourceDirCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key, unknown name).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The backend self-check could not get an answer from the model.
    #[error("Backend check failed for provider '{provider}': {detail}")]
    BackendUnreachable { provider: String, detail: String },

    // ── Ledger errors ─────────────────────────────────────────────────────
    /// The ledger file exists but could not be read.
    #[error("Failed to read ledger '{path}': {source}")]
    StoreReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger file is not a JSON array of account groups.
    #[error("Ledger '{path}' is not valid: {detail}")]
    StoreCorrupt { path: PathBuf, detail: String },

    /// Could not create or write the ledger file.
    #[error("Failed to write ledger '{path}': {source}")]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single statement page (or a whole statement that
/// could not be rasterised).
///
/// The run continues past every variant; the failing page simply contributes
/// no transactions.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The PDF (page `0`) or one page of it could not be rasterised or encoded.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The model answered with blank text.
    #[error("Page {page}: model returned an empty response")]
    EmptyResponse { page: usize },

    /// The candidate text located in the reply is not valid JSON.
    #[error("Page {page}: response is not valid JSON ({detail}); snippet: {snippet:?}")]
    ParseFailed {
        page: usize,
        detail: String,
        snippet: String,
    },

    /// The call to the inference backend failed after all retries.
    #[error("Page {page}: extraction call failed after {retries} retries: {detail}")]
    ExtractionCallFailed {
        page: usize,
        retries: u8,
        detail: String,
    },
}

impl PageError {
    /// 1-indexed page the error belongs to (`0` for whole-document failures).
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::EmptyResponse { page }
            | PageError::ParseFailed { page, .. }
            | PageError::ExtractionCallFailed { page, .. } => *page,
        }
    }
}
