use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::retry::RetryPolicy;
use super::{AdapterError, AdapterResponse, LlmAdapter, RequestConfig, strip_json_fences};
use crate::config::ProviderSettings;

const MAX_ERROR_MESSAGE_CHARS: usize = 512;
const REDACTED: &str = "[REDACTED]";

// --- Wire format (OpenAI-compatible chat completions) ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Map<String, Value>>,
    /// `{"message", "code"}` from most gateways, occasionally a bare string.
    #[serde(default)]
    error: Value,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Binding for OpenRouter and other OpenAI-compatible `chat/completions` endpoints.
///
/// Holds only the HTTP client and the key, so one instance can serve
/// concurrent calls.
pub struct OpenRouterAdapter {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenRouterAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterAdapter")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl OpenRouterAdapter {
    pub fn new(settings: &ProviderSettings, api_key: SecretString) -> Result<Self, AdapterError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("http-referer"),
            header_value("referer", &settings.referer)?,
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            header_value("title", &settings.title)?,
        );

        let client = Client::builder()
            .timeout(settings.timeout())
            .default_headers(headers)
            .build()
            .map_err(AdapterError::Client)?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            retry: RetryPolicy::from_settings(settings),
        })
    }

    async fn send_once(
        &self,
        request: &ChatRequest<'_>,
    ) -> Result<AdapterResponse, AdapterError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(AdapterError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(status = status.as_u16(), error = %e, "failed to read error body");
                    String::new()
                }
            };
            return Err(self.status_error(status, retry_after_secs, &body));
        }

        let body = response.text().await.map_err(AdapterError::Transport)?;
        self.normalize(&body, request.model)
    }

    fn status_error(
        &self,
        status: StatusCode,
        retry_after_secs: Option<u64>,
        body: &str,
    ) -> AdapterError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Unauthorized {
                status: status.as_u16(),
            },
            StatusCode::TOO_MANY_REQUESTS => AdapterError::RateLimited { retry_after_secs },
            _ => {
                let message = serde_json::from_str::<Value>(body)
                    .ok()
                    .and_then(|v| v.get("error").filter(|e| !e.is_null()).map(error_message))
                    .unwrap_or_else(|| body.trim().to_owned());
                let message = if message.is_empty() {
                    status.canonical_reason().unwrap_or("empty response body").to_owned()
                } else {
                    message
                };
                AdapterError::Upstream {
                    status: status.as_u16(),
                    message: self.sanitize(&message),
                }
            }
        }
    }

    /// Convert a raw completion body into the normalized response.
    fn normalize(&self, body: &str, requested_model: &str) -> Result<AdapterResponse, AdapterError> {
        // serde quotes offending values, which may echo request material.
        let completion: ChatCompletion = serde_json::from_str(body)
            .map_err(|e| AdapterError::MalformedResponse(self.sanitize(&e.to_string())))?;

        // Some gateways report upstream failures inside a 200 body.
        if !completion.error.is_null() {
            let status = completion
                .error
                .get("code")
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(502);
            return Err(AdapterError::Upstream {
                status,
                message: self.sanitize(&error_message(&completion.error)),
            });
        }

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::MalformedResponse("response has no choices".to_owned()))?;

        let text = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(AdapterError::EmptyContent)?;

        let content: Value =
            serde_json::from_str(strip_json_fences(&text)).map_err(AdapterError::InvalidJson)?;

        Ok(AdapterResponse {
            content,
            model: completion.model.unwrap_or_else(|| requested_model.to_owned()),
            token_usage: completion.usage.map(integer_counters).unwrap_or_default(),
        })
    }

    /// Provider messages can echo request material; scrub the key and bound the length.
    fn sanitize(&self, message: &str) -> String {
        let key = self.api_key.expose_secret();
        let scrubbed = if key.is_empty() {
            message.to_owned()
        } else {
            message.replace(key, REDACTED)
        };
        if scrubbed.chars().count() > MAX_ERROR_MESSAGE_CHARS {
            let mut truncated: String = scrubbed.chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
            truncated.push_str("...");
            truncated
        } else {
            scrubbed
        }
    }
}

#[async_trait]
impl LlmAdapter for OpenRouterAdapter {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(
        &self,
        prompt: &str,
        system_message: &str,
        config: &RequestConfig,
    ) -> Result<AdapterResponse, AdapterError> {
        let request = ChatRequest {
            model: &config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_message,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: config.temperature(),
            max_tokens: config.max_tokens(),
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut retry = 0;
        loop {
            match self.send_once(&request).await {
                Ok(response) => {
                    debug!(
                        model = %response.model,
                        usage = ?response.token_usage,
                        "completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    retry += 1;
                    let hint = match &e {
                        AdapterError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Some(Duration::from_secs(*secs)),
                        _ => None,
                    };
                    let delay = self.retry.delay_with_hint(retry, hint);
                    warn!(
                        error = %e,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("message").and_then(Value::as_str) {
            Some(message) => message.to_owned(),
            None => error.to_string(),
        },
        other => other.to_string(),
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, AdapterError> {
    HeaderValue::from_str(value)
        .map_err(|_| AdapterError::Settings(format!("provider.{field} is not a valid header value")))
}

/// Keep only integer counters; nested detail objects and costs are dropped.
fn integer_counters(usage: Map<String, Value>) -> BTreeMap<String, u64> {
    usage
        .into_iter()
        .filter_map(|(name, value)| value.as_u64().map(|n| (name, n)))
        .collect()
}
