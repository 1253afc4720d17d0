//! Configuration types for a statement scan.
//!
//! All run behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The CLI maps its flags onto the builder; library
//! callers set only what they care about and keep the documented defaults for
//! the rest.

use crate::error::TradesError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default directory scanned for statement PDFs.
pub const DEFAULT_SOURCE_DIR: &str = "./data";
/// Default ledger location.
pub const DEFAULT_OUTPUT_PATH: &str = "results.json";
/// Default provider: a local Ollama daemon.
pub const DEFAULT_PROVIDER: &str = "ollama";
/// Default vision model served by that daemon.
pub const DEFAULT_MODEL: &str = "qwen3-vl:8b";

/// Configuration for one scan-and-merge run.
///
/// # Example
/// ```rust
/// use edgequake_trades::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .source_dir("statements")
///     .output_path("ledger.json")
///     .model("qwen2.5vl:7b")
///     .build()
///     .unwrap();
/// assert_eq!(config.provider_name, "ollama");
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// Directory holding the statement PDFs. Default: `./data`.
    pub source_dir: PathBuf,

    /// Ledger file read at start and rewritten at the end. Default: `results.json`.
    pub output_path: PathBuf,

    /// Rendering DPI. Range: 72–400. Default: 200.
    ///
    /// Statement tables use small print; 200 DPI keeps digits readable for
    /// 7–8B vision models.
    pub dpi: u32,

    /// Cap on either rendered dimension, in pixels. Default: 2400.
    pub max_rendered_pixels: u32,

    /// Provider name passed to `ProviderFactory` (ollama, openai, anthropic,
    /// gemini, azure). Default: `ollama`.
    pub provider_name: String,

    /// Vision model identifier. Default: `qwen3-vl:8b`.
    pub model: String,

    /// Pre-constructed provider. Takes precedence over `provider_name`/`model`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (transcription, not creativity).
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page after a failed extraction call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Timeout for one extraction call, in seconds. Default: 300.
    ///
    /// Local models on CPU can take minutes per page.
    pub api_timeout_secs: u64,

    /// User password for encrypted statements.
    pub password: Option<String>,

    /// Replacement for the built-in extraction prompt.
    pub prompt: Option<String>,

    /// Receives file and page events while the scan runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            dpi: 200,
            max_rendered_pixels: 2400,
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 300,
            password: None,
            prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("source_dir", &self.source_dir)
            .field("output_path", &self.output_path)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ScanConfig`].
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl fmt::Debug for ScanConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ScanConfigBuilder {
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.source_dir = dir.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, TradesError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(TradesError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(TradesError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(TradesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.provider.is_none() && (c.provider_name.trim().is_empty() || c.model.trim().is_empty()) {
            return Err(TradesError::InvalidConfig(
                "provider name and model must not be empty".into(),
            ));
        }
        if c.prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(TradesError::InvalidConfig(
                "custom extraction prompt is empty".into(),
            ));
        }
        Ok(self.config)
    }
}
