//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file named by `SMX_CONFIG`) relative to
//! the current working directory, then applies `SMX_LOG_LEVEL` and `PROFILE`
//! env overrides. Provider API keys are only ever read from the environment
//! variable each provider names in `api_key_env`, never from TOML.

use std::{
    collections::BTreeMap,
    env,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// Task framing sent as the second prompt message when no instruction file
/// is configured.
pub const DEFAULT_INSTRUCTION: &str = "Generate a response to the given query, limiting your knowledge \
to the given content. Also refer to the chat history if needed.";

/// Which client implementation a provider entry is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Offline echo backend, no credential needed.
    Dummy,
    /// Any `/v1/chat/completions` endpoint (OpenAI, DeepSeek, xAI, Ollama…).
    #[serde(alias = "openai-compatible", alias = "openai_compatible")]
    Openai,
}

/// One `[llm.providers.<key>]` section, resolved.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Stable lookup key (the TOML table name).
    pub key: String,
    pub kind: ProviderKind,
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Name of the env var holding the credential, if the provider needs one.
    pub api_key_env: Option<String>,
    /// Credential resolved from `api_key_env` at load time.
    pub api_key: Option<String>,
    /// Ordered model catalog; index 0 is the provider's default model.
    pub models: Vec<String>,
}

/// LLM backend selection.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider key used by the orchestrator (`default` in `[llm]`).
    pub provider: String,
    /// Model id within that provider; `None` means the first catalog entry.
    pub model: Option<String>,
    /// Enabled providers, ordered by key.
    pub providers: Vec<ProviderConfig>,
}

/// Per-query deployment constants and prompt framing.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Persona text sent as the system message.
    pub profile: String,
    /// Task framing sent as the first user message.
    pub instruction: String,
    /// Number of recent turns included in each prompt.
    pub history_window: usize,
    /// Retention cap for stored turns; `None` keeps everything.
    pub history_cap: Option<usize>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on a single provider call.
    pub timeout_seconds: u64,
    /// Extra attempts after a failed provider call.
    pub retries: u32,
}

/// Source documents for system-wide context.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Directory of `.md` / `.txt` files (already expanded, no `~`).
    /// `None` disables system context.
    pub docs_dir: Option<PathBuf>,
    /// Approximate maximum characters per chunk.
    pub chunk_size: usize,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub log_level: String,
    pub chat: ChatConfig,
    pub context: ContextConfig,
    pub llm: LlmConfig,
}

/// Raw TOML shape — `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    chat: RawChat,
    #[serde(default)]
    context: RawContext,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_app_name")]
    name: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default)]
    profile_file: Option<String>,
    #[serde(default)]
    instruction_file: Option<String>,
    #[serde(default = "default_history_window")]
    history_window: usize,
    #[serde(default)]
    history_cap: Option<usize>,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    retries: u32,
}

impl Default for RawChat {
    fn default() -> Self {
        Self {
            profile_file: None,
            instruction_file: None,
            history_window: default_history_window(),
            history_cap: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
            retries: 0,
        }
    }
}

#[derive(Deserialize)]
struct RawContext {
    #[serde(default)]
    docs_dir: Option<String>,
    #[serde(default = "default_chunk_size")]
    chunk_size: usize,
}

impl Default for RawContext {
    fn default() -> Self {
        Self { docs_dir: None, chunk_size: default_chunk_size() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    model: Option<String>,
    /// `[llm.providers.<key>]` sections; `BTreeMap` keeps key order stable.
    #[serde(default)]
    providers: BTreeMap<String, RawProvider>,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), model: None, providers: BTreeMap::new() }
    }
}

#[derive(Deserialize)]
struct RawProvider {
    /// Defaults to `true`; set to `false` to keep a section without loading it.
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_provider_kind")]
    kind: ProviderKind,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    models: Vec<String>,
}

fn default_app_name() -> String { "smx".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_history_window() -> usize { 10 }
fn default_temperature() -> f32 { 0.3 }
fn default_max_tokens() -> u32 { 300 }
fn default_timeout_seconds() -> u64 { 60 }
fn default_chunk_size() -> usize { 1000 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_provider_kind() -> ProviderKind { ProviderKind::Openai }
fn default_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_true() -> bool { true }

/// Load config from `SMX_CONFIG` (default `config/default.toml`), then apply
/// env-var overrides and resolve provider keys from the environment.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("SMX_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
    let log_level_override = env::var("SMX_LOG_LEVEL").ok();
    let profile_override = env::var("PROFILE").ok();
    load_from(
        Path::new(&path),
        log_level_override.as_deref(),
        profile_override.as_deref(),
        |name| env::var(name).ok().filter(|v| !v.trim().is_empty()),
    )
}

/// Internal loader — accepts an explicit path, optional overrides and a key
/// lookup. Tests pass these directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    profile_override: Option<&str>,
    lookup_key: impl Fn(&str) -> Option<String>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let log_level = log_level_override.unwrap_or(&parsed.app.log_level).to_string();

    let c = parsed.chat;
    if !(0.0..=2.0).contains(&c.temperature) {
        return Err(AppError::Config(format!(
            "chat.temperature must be within 0.0..=2.0, got {}",
            c.temperature
        )));
    }
    if c.max_tokens == 0 {
        return Err(AppError::Config("chat.max_tokens must be > 0".into()));
    }
    if c.timeout_seconds == 0 {
        return Err(AppError::Config("chat.timeout_seconds must be > 0".into()));
    }
    if c.history_cap.is_some_and(|cap| cap < 2) {
        return Err(AppError::Config(
            "chat.history_cap must hold at least one exchange (>= 2) when set".into(),
        ));
    }

    let profile = match profile_override {
        Some(text) => text.to_string(),
        None => {
            let file = c.profile_file.as_deref().ok_or_else(|| {
                AppError::Config("no profile: set PROFILE or chat.profile_file".into())
            })?;
            read_text(&expand_home(file), "chat.profile_file")?
        }
    };
    if profile.trim().is_empty() {
        return Err(AppError::Config("profile text is empty".into()));
    }

    let instruction = match c.instruction_file.as_deref() {
        Some(file) => read_text(&expand_home(file), "chat.instruction_file")?,
        None => DEFAULT_INSTRUCTION.to_string(),
    };

    if parsed.context.chunk_size == 0 {
        return Err(AppError::Config("context.chunk_size must be > 0".into()));
    }

    let providers = parsed
        .llm
        .providers
        .into_iter()
        .filter(|(_, p)| p.enabled)
        .map(|(key, p)| {
            if p.models.is_empty() {
                return Err(AppError::Config(format!("provider '{key}' lists no models")));
            }
            let api_key = p.api_key_env.as_deref().and_then(&lookup_key);
            Ok(ProviderConfig {
                key,
                kind: p.kind,
                api_base_url: p.api_base_url,
                api_key_env: p.api_key_env,
                api_key,
                models: p.models,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Config {
        app_name: parsed.app.name,
        log_level,
        chat: ChatConfig {
            profile,
            instruction,
            history_window: c.history_window,
            history_cap: c.history_cap,
            temperature: c.temperature,
            max_tokens: c.max_tokens,
            timeout_seconds: c.timeout_seconds,
            retries: c.retries,
        },
        context: ContextConfig {
            docs_dir: parsed.context.docs_dir.as_deref().map(expand_home),
            chunk_size: parsed.context.chunk_size,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            model: parsed.llm.model,
            providers,
        },
    })
}

fn read_text(path: &Path, field: &str) -> Result<String, AppError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| AppError::Config(format!("{field}: cannot read {}: {e}", path.display())))
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

#[cfg(test)]
impl Config {
    /// Offline `Config` for tests — dummy provider, no keys, no docs dir.
    pub fn test_default() -> Self {
        Self {
            app_name: "test".into(),
            log_level: "info".into(),
            chat: ChatConfig {
                profile: "You are a test assistant.".into(),
                instruction: DEFAULT_INSTRUCTION.into(),
                history_window: default_history_window(),
                history_cap: None,
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                timeout_seconds: 1,
                retries: 0,
            },
            context: ContextConfig { docs_dir: None, chunk_size: default_chunk_size() },
            llm: LlmConfig {
                provider: "dummy".into(),
                model: None,
                providers: vec![ProviderConfig {
                    key: "dummy".into(),
                    kind: ProviderKind::Dummy,
                    api_base_url: String::new(),
                    api_key_env: None,
                    api_key: None,
                    models: vec!["echo".into()],
                }],
            },
        }
    }
}
