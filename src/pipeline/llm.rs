//! Extraction client: send one statement page to the vision model.
//!
//! This module only moves bytes to the provider and text back. What the text
//! means is decided downstream by [`crate::pipeline::normalize`] and
//! [`crate::pipeline::coerce`]; the prompt lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. Failed attempts are retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`); once retries are
//! exhausted the page fails with [`PageError::ExtractionCallFailed`] and the
//! scan moves on to the next page.

use crate::config::ScanConfig;
use crate::error::{PageError, TradesError};
use crate::prompts::{EXTRACTION_PROMPT, HEALTH_CHECK_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Raw model answer for one page.
#[derive(Debug, Clone)]
pub struct PageReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attempts that failed before this answer arrived.
    pub retries: u8,
}

/// Ask the model to extract the transactions visible on one page.
///
/// The prompt and the page image travel in a single user message, the layout
/// Ollama's vision models are tuned for.
pub async fn request_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image_data: ImageData,
    config: &ScanConfig,
) -> Result<PageReply, PageError> {
    let prompt = config.prompt.as_deref().unwrap_or(EXTRACTION_PROMPT);
    let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
    let options = build_options(config);
    let limit = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(limit, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens",
                    page_num, response.prompt_tokens, response.completion_tokens
                );
                return Ok(PageReply {
                    text: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: attempt as u8,
                });
            }
            Ok(Err(e)) => {
                let err_msg = e.to_string();
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", config.api_timeout_secs);
                warn!("Page {}: attempt {} {}", page_num, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(PageError::ExtractionCallFailed {
        page: page_num,
        retries: config.max_retries as u8,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

/// Send a short text prompt and return the reply; used by `--check`.
pub async fn check_backend(
    provider: &Arc<dyn LLMProvider>,
    config: &ScanConfig,
) -> Result<String, TradesError> {
    let messages = vec![ChatMessage::user(HEALTH_CHECK_PROMPT)];
    let options = build_options(config);
    let limit = Duration::from_secs(config.api_timeout_secs);

    let unreachable = |detail: String| TradesError::BackendUnreachable {
        provider: config.provider_name.clone(),
        detail,
    };

    match timeout(limit, provider.chat(&messages, Some(&options))).await {
        Ok(Ok(response)) => Ok(response.content.trim().to_string()),
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!(
            "no answer within {}s",
            config.api_timeout_secs
        ))),
    }
}

/// Build `CompletionOptions` from the scan config.
fn build_options(config: &ScanConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
