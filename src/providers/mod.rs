pub mod openrouter;
pub mod retry;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AnalysisSettings;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

const ANALYSIS_SYSTEM_MESSAGE: &str =
    "You are an expert analysis engine. Process the data according to the provided prompt.";

/// Failures at the provider boundary. A binding returns one of these or a
/// complete `AdapterResponse`, never a partial result.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid provider setting: {0}")]
    Settings(String),

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("failed to encode request")]
    Encode(#[source] serde_json::Error),

    #[error("transport failure")]
    Transport(#[source] reqwest::Error),

    #[error("provider rejected credentials (status {status})")]
    Unauthorized { status: u16 },

    #[error("provider rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("provider returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider returned empty content")]
    EmptyContent,

    #[error("provider content is not valid JSON")]
    InvalidJson(#[source] serde_json::Error),
}

impl AdapterError {
    /// Transport failures, rate limiting, and server errors may succeed on a
    /// later attempt. Everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Transport(_) | AdapterError::RateLimited { .. } => true,
            AdapterError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Per-request model parameters. Unset values take the binding's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl RequestConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

impl From<&AnalysisSettings> for RequestConfig {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: Some(settings.temperature),
            max_tokens: Some(settings.max_tokens),
        }
    }
}

/// Provider-independent result of one completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdapterResponse {
    pub content: Value,
    pub model: String,
    pub token_usage: BTreeMap<String, u64>,
}

/// Extension point for LLM inference backends. Bindings implement `generate`;
/// `analyze` is composed on top of it.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// One chat completion: system message plus one user turn, JSON response.
    async fn generate(
        &self,
        prompt: &str,
        system_message: &str,
        config: &RequestConfig,
    ) -> Result<AdapterResponse, AdapterError>;

    /// Serialize `data` and the instructions into a single user turn under a
    /// fixed analysis-engine system message.
    async fn analyze(
        &self,
        data: &Value,
        analysis_prompt: &str,
        config: &RequestConfig,
    ) -> Result<AdapterResponse, AdapterError> {
        let prompt = analysis_user_prompt(data, analysis_prompt)?;
        self.generate(&prompt, ANALYSIS_SYSTEM_MESSAGE, config).await
    }
}

fn analysis_user_prompt(data: &Value, analysis_prompt: &str) -> Result<String, AdapterError> {
    let encoded = serde_json::to_string(data).map_err(AdapterError::Encode)?;
    Ok(format!("DATA: {encoded}\n\nANALYSIS PROMPT: {analysis_prompt}"))
}

/// Strips ```json ... ``` or ``` ... ``` fences some models wrap JSON in even
/// when JSON mode was requested.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}
