//! Configuration for one extraction run.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via [`ExtractionConfigBuilder`]. The external collaborators (text
//! extractor, rasterizer, repairer, completion service) default to the local
//! poppler/qpdf/gs tools and an OpenAI-compatible HTTP endpoint; each can be
//! replaced with any implementation of its trait.

use crate::error::ScanfileError;
use crate::pipeline::llm::CompletionService;
use crate::pipeline::render::Rasterizer;
use crate::pipeline::repair::DocumentRepairer;
use crate::pipeline::text::TextExtractor;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default chat-completions endpoint (LM Studio's local server).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";

/// Default model identifier sent with every request.
pub const DEFAULT_MODEL: &str = "qwen3-vl-8b-instruct";

/// Default character budgets for the text cascade, largest first.
pub const DEFAULT_TEXT_BUDGETS: [usize; 4] = [7000, 4500, 2800, 1600];

/// Configuration for extracting metadata from one PDF.
///
/// # Example
/// ```rust
/// use scanfile_rename::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .api_timeout_secs(60)
///     .max_retries(2)
///     .allow_repair(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.vision_page_counts(), vec![3, 2, 1]);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Chat-completions URL. A bare `/v1` base is completed to
    /// `/v1/chat/completions`. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Named `edgequake-llm` provider ("openai", "anthropic", "ollama", ...).
    /// When set, requests go through that provider instead of `endpoint`.
    pub provider_name: Option<String>,

    /// Bearer token for the HTTP endpoint, if it needs one.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Extra attempts on transport or server-class failures. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Rasterization DPI. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Longest edge of a page image sent to the model. Larger renders are
    /// downscaled. Default: 2400.
    pub max_rendered_pixels: u32,

    /// Largest page count tried by the vision cascade. Default: 3.
    pub vision_max_pages: u32,

    /// Minimum trimmed text length for the text cascade. Default: 200.
    pub min_text_chars: usize,

    /// Character budgets for the text cascade, non-increasing.
    pub text_budgets: Vec<usize>,

    /// `max_tokens` for text-cascade requests. Default: 350.
    pub text_max_tokens: usize,

    /// `max_tokens` for vision requests. Default: 450.
    pub vision_max_tokens: usize,

    /// Allow one qpdf/gs repair attempt per run. Default: true.
    pub allow_repair: bool,

    /// Upper bound on returned keywords; 0 yields an empty list. Default: 5.
    pub keywords_count: usize,

    /// `pdftotext` program (absolute path or name looked up on `PATH`).
    pub pdftotext: PathBuf,
    pub pdftoppm: PathBuf,
    pub qpdf: PathBuf,
    pub gs: PathBuf,

    /// Receives cascade events. `None` means no events are emitted.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-constructed completion service. Takes precedence over
    /// `provider_name` and `endpoint`.
    pub service: Option<Arc<dyn CompletionService>>,
    pub text_extractor: Option<Arc<dyn TextExtractor>>,
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub repairer: Option<Arc<dyn DocumentRepairer>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            api_key: None,
            api_timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 500,
            dpi: 200,
            max_rendered_pixels: 2400,
            vision_max_pages: 3,
            min_text_chars: 200,
            text_budgets: DEFAULT_TEXT_BUDGETS.to_vec(),
            text_max_tokens: 350,
            vision_max_tokens: 450,
            allow_repair: true,
            keywords_count: 5,
            pdftotext: PathBuf::from("pdftotext"),
            pdftoppm: PathBuf::from("pdftoppm"),
            qpdf: PathBuf::from("qpdf"),
            gs: PathBuf::from("gs"),
            progress_callback: None,
            service: None,
            text_extractor: None,
            rasterizer: None,
            repairer: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("dpi", &self.dpi)
            .field("vision_max_pages", &self.vision_max_pages)
            .field("min_text_chars", &self.min_text_chars)
            .field("text_budgets", &self.text_budgets)
            .field("allow_repair", &self.allow_repair)
            .field("keywords_count", &self.keywords_count)
            .field("service", &self.service.as_ref().map(|_| "<dyn CompletionService>"))
            .field("text_extractor", &self.text_extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn Rasterizer>"))
            .field("repairer", &self.repairer.as_ref().map(|_| "<dyn DocumentRepairer>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page counts tried by the vision cascade: `[max, max-1, 1]`, never
    /// below one, consecutive duplicates removed.
    pub fn vision_page_counts(&self) -> Vec<u32> {
        let max = self.vision_max_pages.max(1);
        let mut counts = vec![max, (max - 1).max(1), 1];
        counts.dedup();
        counts
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
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

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn vision_max_pages(mut self, n: u32) -> Self {
        self.config.vision_max_pages = n;
        self
    }

    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn text_budgets(mut self, budgets: impl Into<Vec<usize>>) -> Self {
        self.config.text_budgets = budgets.into();
        self
    }

    pub fn text_max_tokens(mut self, n: usize) -> Self {
        self.config.text_max_tokens = n;
        self
    }

    pub fn vision_max_tokens(mut self, n: usize) -> Self {
        self.config.vision_max_tokens = n;
        self
    }

    pub fn allow_repair(mut self, v: bool) -> Self {
        self.config.allow_repair = v;
        self
    }

    pub fn keywords_count(mut self, n: usize) -> Self {
        self.config.keywords_count = n;
        self
    }

    pub fn pdftotext(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftotext = path.into();
        self
    }

    pub fn pdftoppm(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm = path.into();
        self
    }

    pub fn qpdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.qpdf = path.into();
        self
    }

    pub fn gs(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.gs = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn service(mut self, service: Arc<dyn CompletionService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.text_extractor = Some(extractor);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn repairer(mut self, repairer: Arc<dyn DocumentRepairer>) -> Self {
        self.config.repairer = Some(repairer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ScanfileError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ScanfileError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.vision_max_pages == 0 {
            return Err(ScanfileError::InvalidConfig(
                "vision_max_pages must be ≥ 1".into(),
            ));
        }
        if c.text_budgets.is_empty() || c.text_budgets.contains(&0) {
            return Err(ScanfileError::InvalidConfig(
                "text_budgets must be non-empty and positive".into(),
            ));
        }
        if c.text_budgets.windows(2).any(|w| w[1] > w[0]) {
            return Err(ScanfileError::InvalidConfig(format!(
                "text_budgets must be non-increasing, got {:?}",
                c.text_budgets
            )));
        }
        if c.endpoint.trim().is_empty() && c.provider_name.is_none() && c.service.is_none() {
            return Err(ScanfileError::InvalidConfig(
                "an endpoint, provider or service is required".into(),
            ));
        }
        Ok(self.config)
    }
}
