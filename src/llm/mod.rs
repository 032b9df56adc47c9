//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! The orchestrator never talks to a provider directly; it resolves an
//! [`InvocationTarget`] through the [`ProviderRegistry`] and calls that.

pub mod providers;
pub mod registry;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use registry::{InvocationTarget, ProviderRegistry, ProviderSpec};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider '{provider}' has no model '{model}'")]
    UnknownModel { provider: String, model: String },
    #[error("provider '{provider}' has no model at index {index} ({len} configured)")]
    ModelIndex { provider: String, index: usize, len: usize },
    #[error("provider '{0}' registered twice")]
    Duplicate(String),
    #[error("provider '{provider}' needs a credential in ${env}")]
    MissingCredential { provider: String, env: String },
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned no completion text")]
    EmptyResponse,
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Role tag on a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One role-tagged message in an assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Token counts reported by the backend, when it reports any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Text of the first completion choice plus optional usage.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

/// Sampling and call limits fixed per deployment, not per query.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single provider call, retries included.
    pub timeout: Duration,
    /// Extra attempts after a failed call. Cancellation and timeout are final.
    pub retries: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 300,
            timeout: Duration::from_secs(60),
            retries: 0,
        }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// One round-trip: send `messages` to `model` and return the first choice.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[PromptMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<LlmResponse, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(model, messages).await,
            LlmProvider::OpenAiCompatible(p) => {
                p.complete(model, messages, temperature, max_tokens).await
            }
        }
    }
}
