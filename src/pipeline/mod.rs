//! Per-page stages of a scan.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ encode ──▶ llm ──▶ normalize ──▶ coerce
//! (pdfium)   (base64)   (VLM)   (find JSON)   (typed records)
//! ```
//!
//! 1. [`render`] — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`] — PNG-encode and base64-wrap each `DynamicImage`
//! 3. [`llm`]    — the VLM call with timeout and retry/backoff; the only stage
//!    with network I/O
//! 4. [`normalize`] — locate the JSON payload inside free-form model output
//! 5. [`coerce`] — parse the payload and repair each record into a
//!    [`Transaction`](crate::model::Transaction)

pub mod coerce;
pub mod encode;
pub mod llm;
pub mod normalize;
pub mod render;
