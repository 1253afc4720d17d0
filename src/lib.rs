//! # edgequake-trades
//!
//! Extract stock-trade transactions from bank statement PDFs using Vision
//! Language Models (VLMs), and keep them in a deduplicated JSON ledger grouped
//! by account.
//!
//! ## Why this crate?
//!
//! Brokerage statements are laid out for people: tables span pages, columns
//! shift between banks, and figures use local number formats. Text extraction
//! loses the structure. Instead this crate rasterises each page into a PNG and
//! asks a VLM to read the trades off it, then repairs whatever the model
//! returns into typed records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! statements dir
//!  │
//!  ├─ 1. Discover  *.pdf in name order
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    PNG → base64 ImageData
//!  ├─ 4. VLM       one call per page, sequential, retry with backoff
//!  ├─ 5. Normalise locate the JSON payload in the reply
//!  ├─ 6. Coerce    repair fields into `Transaction` records
//!  └─ 7. Merge     dedup by reference, group by account, save the ledger
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_trades::{run, RunOutcome, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Local Ollama with qwen3-vl:8b unless configured otherwise
//!     let config = ScanConfig::builder()
//!         .source_dir("./data")
//!         .output_path("results.json")
//!         .build()?;
//!     if let RunOutcome::Completed(summary) = run(&config).await? {
//!         eprintln!("{} new transaction(s)", summary.merge.added);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The merge step is usable on its own:
//!
//! ```rust
//! use edgequake_trades::{merge, Transaction};
//!
//! let tx = Transaction {
//!     reference: Some("OP-1".into()),
//!     account_number: Some("FR76-001".into()),
//!     ..Default::default()
//! };
//! let ledger = merge(&[], &[tx.clone(), tx]);
//! assert_eq!(ledger.len(), 1);
//! assert_eq!(ledger[0].transactions.len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2trades` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-trades = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod prompts;
pub mod scan;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{PageError, TradesError};
pub use merge::{merge, merge_with_report, MergeOutcome, MergeReport};
pub use model::{AccountGroup, Transaction, TransactionTarget};
pub use output::{FileReport, PageOutcome, RunOutcome, RunSummary};
pub use pipeline::coerce::interpret_response;
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use scan::{check_setup, discover_statements, run, run_sync, SetupReport};
pub use store::{load_ledger, load_ledger_or_empty, save_ledger};
