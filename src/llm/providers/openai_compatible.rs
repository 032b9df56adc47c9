//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! All OpenAI wire types are private to this module — callers only see
//! [`PromptMessage`] in and [`LlmResponse`] out. The model id is chosen per
//! call so one client serves every model in a provider's catalog.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::llm::{LlmResponse, LlmUsage, PromptMessage, ProviderError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI, DeepSeek, xAI, and OpenAI-compatible local servers.
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider for `api_base_url`.
    ///
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request. The overall call
    /// deadline is owned by the orchestrator, so only connects are bounded here.
    pub fn new(api_base_url: String, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, api_key })
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<LlmResponse, ProviderError> {
        let payload = ChatCompletionRequest::new(model, messages, temperature, max_tokens);

        debug!(
            %model,
            temperature = ?payload.temperature,
            messages = payload.messages.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");
        parsed.into_response()
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(model: &'a str, messages: &'a [PromptMessage], temperature: f32, max_tokens: u32) -> Self {
        // gpt-5 family rejects `temperature` and renames the token limit.
        let reasoning = model.starts_with("gpt-5");
        Self {
            model,
            messages: messages
                .iter()
                .map(|m| Message { role: m.role.as_str(), content: &m.content })
                .collect(),
            temperature: (!reasoning).then_some(temperature),
            max_tokens: (!reasoning).then_some(max_tokens),
            max_completion_tokens: reasoning.then_some(max_tokens),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

impl ChatCompletionResponse {
    /// First choice's content, verbatim.
    fn into_response(self) -> Result<LlmResponse, ProviderError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ProviderError::EmptyResponse)?;
        let usage = self.usage.map(|u| LlmUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        Ok(LlmResponse { text, usage })
    }
}

#[derive(Debug, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Render a non-2xx body as a one-line message, preferring the JSON envelope.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let code = env
                .error
                .code
                .map(|v| match v {
                    serde_json::Value::String(s) => format!(" [code={s}]"),
                    other => format!(" [code={other}]"),
                })
                .unwrap_or_default();
            format!("HTTP {status}{code}: {}", env.error.message)
        }
        Err(_) => format!("HTTP {status}: {body}"),
    }
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = error_message(status, &body);

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}
