//! Model interaction: request types, the retry loop, and service adapters.
//!
//! The orchestrator only sees [`CompletionService`]: a request goes in, the
//! reply text or a classified [`ServiceError`] comes out. Two adapters are
//! provided:
//!
//! * [`OpenAiCompatibleService`] posts to a `/v1/chat/completions` endpoint
//!   (LM Studio, llama.cpp server, vLLM, Ollama's OpenAI shim, ...).
//! * [`ProviderService`] wraps any `edgequake-llm` provider.
//!
//! All prompt wording lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! Only transport failures and 5xx responses are retried, with exponential
//! backoff (`retry_backoff_ms * 2^(attempt-1)`). Client errors are returned
//! at once: a context-overflow 400 must reach the orchestrator so it can
//! shrink the input instead of resending the same request.

use crate::config::{ExtractionConfig, DEFAULT_ENDPOINT};
use crate::error::{ScanfileError, ServiceError};
use crate::pipeline::encode::PageImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

// ── Request types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(PageImage),
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ChatTurn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// User turn with the prompt text first, then the page images in order.
    pub fn user_with_images(text: impl Into<String>, images: &[PageImage]) -> Self {
        let mut parts = vec![ContentPart::Text(text.into())];
        parts.extend(images.iter().cloned().map(ContentPart::Image));
        Self {
            role: Role::User,
            parts,
        }
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &PageImage> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::Image(img) => Some(img),
            ContentPart::Text(_) => None,
        })
    }
}

/// A single chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub turns: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
    /// Extra attempts on retryable failures.
    pub max_retries: u32,
}

impl CompletionRequest {
    /// Deterministic request (temperature 0) using the run's model,
    /// timeout and retry settings.
    pub fn new(config: &ExtractionConfig, turns: Vec<ChatTurn>, max_tokens: usize) -> Self {
        Self {
            model: config.model.clone(),
            turns,
            temperature: 0.0,
            max_tokens,
            timeout: Duration::from_secs(config.api_timeout_secs.max(1)),
            max_retries: config.max_retries,
        }
    }
}

// ── Service trait and retry loop ─────────────────────────────────────────────

/// A chat-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send `request` once and return the reply text.
    async fn send(&self, request: &CompletionRequest) -> Result<String, ServiceError>;
}

/// Send `request`, retrying transport and server-class failures up to
/// `request.max_retries` times.
pub async fn complete_with_retry(
    service: &dyn CompletionService,
    request: &CompletionRequest,
    retry_backoff_ms: u64,
) -> Result<String, ServiceError> {
    let start = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let backoff = retry_backoff_ms.saturating_mul(2u64.saturating_pow(attempt - 1));
            warn!(
                "LLM retry {}/{} after {}ms",
                attempt, request.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match service.send(request).await {
            Ok(reply) => {
                debug!(
                    "LLM reply: {} chars in {:?} ({} attempt(s))",
                    reply.len(),
                    start.elapsed(),
                    attempt + 1
                );
                return Ok(reply);
            }
            Err(e) if e.is_retryable() && attempt < request.max_retries => {
                warn!("LLM attempt {} failed: {}", attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pick the service for a run: an injected one, a named `edgequake-llm`
/// provider, or the OpenAI-compatible endpoint.
pub fn resolve_service(
    config: &ExtractionConfig,
) -> Result<Arc<dyn CompletionService>, ScanfileError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }
    if let Some(ref name) = config.provider_name {
        let service = ProviderService::from_name(name, &config.model)?;
        return Ok(Arc::new(service));
    }
    let service =
        OpenAiCompatibleService::new(&config.endpoint, config.api_key.clone())?;
    Ok(Arc::new(service))
}

// ── OpenAI-compatible HTTP endpoint ──────────────────────────────────────────

/// Complete a base URL to a chat-completions endpoint.
///
/// `http://host/v1` and `http://host/v1/` gain `/chat/completions`; anything
/// else is kept as given (minus trailing slashes). Empty input yields
/// [`DEFAULT_ENDPOINT`].
pub fn normalize_chat_completions_endpoint(endpoint: &str) -> String {
    let s = endpoint.trim();
    if s.is_empty() {
        return DEFAULT_ENDPOINT.to_string();
    }
    let s = s.trim_end_matches('/');
    if s.ends_with("/v1") {
        format!("{s}/chat/completions")
    } else {
        s.to_string()
    }
}

/// Posts requests to an OpenAI-style `/v1/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleService {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, ScanfileError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ScanfileError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: normalize_chat_completions_endpoint(endpoint),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// JSON body for a chat-completions request.
///
/// Text-only turns use a plain string `content`; turns with images use the
/// array form with `image_url` data URLs.
pub fn request_body(request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .turns
        .iter()
        .map(|turn| {
            let has_images = turn.images().next().is_some();
            let content = if has_images {
                Value::Array(
                    turn.parts
                        .iter()
                        .map(|p| match p {
                            ContentPart::Text(t) => json!({"type": "text", "text": t}),
                            ContentPart::Image(img) => {
                                json!({"type": "image_url", "image_url": {"url": img.data_url()}})
                            }
                        })
                        .collect(),
                )
            } else {
                Value::String(turn.text())
            };
            json!({"role": turn.role.as_str(), "content": content})
        })
        .collect();

    json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

/// Best-effort error text from a failed response body: the `error` field
/// (string, or object with `message`), else the body itself.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => match v.get("error") {
            Some(Value::String(s)) => s.clone(),
            Some(err @ Value::Object(obj)) => obj
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string()),
            Some(other) => other.to_string(),
            None => v.to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatibleService {
    async fn send(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let body = request_body(request);
        debug!("LLM request to {} (model={})", self.endpoint, request.model);

        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if status >= 500 {
            return Err(ServiceError::Server {
                status,
                message: error_message(&text),
            });
        }
        if status >= 400 {
            return Err(ServiceError::Client {
                status,
                message: error_message(&text),
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| {
            ServiceError::MalformedResponse(format!(
                "{e} | body={}",
                crate::error::clip(&text, 2000)
            ))
        })?;
        v["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::MalformedResponse("missing choices[0].message.content".into())
            })
    }
}

// ── edgequake-llm providers ──────────────────────────────────────────────────

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([45]\d\d)\b").expect("status regex is valid"));

/// Adapter for any `edgequake-llm` provider (OpenAI, Anthropic, Gemini,
/// Ollama, ...).
pub struct ProviderService {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Instantiate a named provider with the given model.
    ///
    /// API keys are read from the provider's usual environment variables.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, ScanfileError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            ScanfileError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider))
    }
}

/// Map a provider error message onto the retry classes.
///
/// Providers surface HTTP failures as text, so the status code (when one is
/// present) decides; otherwise network-sounding messages are transport
/// failures and everything else is a client error.
pub fn classify_provider_error(message: &str) -> ServiceError {
    let low = message.to_lowercase();
    if let Some(status) = STATUS_CODE
        .captures(message)
        .and_then(|c| c[1].parse::<u16>().ok())
    {
        return if status >= 500 || status == 429 {
            ServiceError::Server {
                status,
                message: message.to_string(),
            }
        } else {
            ServiceError::Client {
                status,
                message: message.to_string(),
            }
        };
    }
    if ["timed out", "timeout", "connection", "network", "dns"]
        .iter()
        .any(|k| low.contains(k))
    {
        return ServiceError::Transport(message.to_string());
    }
    if low.contains("rate limit") || low.contains("overloaded") {
        return ServiceError::Server {
            status: 429,
            message: message.to_string(),
        };
    }
    ServiceError::Client {
        status: 0,
        message: message.to_string(),
    }
}

fn to_chat_messages(turns: &[ChatTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| {
            let text = turn.text();
            match turn.role {
                Role::System => ChatMessage::system(text),
                Role::User => {
                    let images: Vec<_> = turn.images().map(PageImage::to_image_data).collect();
                    if images.is_empty() {
                        ChatMessage::user(text)
                    } else {
                        ChatMessage::user_with_images(text, images)
                    }
                }
            }
        })
        .collect()
}

#[async_trait]
impl CompletionService for ProviderService {
    async fn send(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        let messages = to_chat_messages(&request.turns);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        match tokio::time::timeout(request.timeout, self.provider.chat(&messages, Some(&options)))
            .await
        {
            Err(_) => Err(ServiceError::Transport(format!(
                "request timed out after {}s",
                request.timeout.as_secs()
            ))),
            Ok(Err(e)) => Err(classify_provider_error(&e.to_string())),
            Ok(Ok(response)) => {
                debug!(
                    "{} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
        }
    }
}
