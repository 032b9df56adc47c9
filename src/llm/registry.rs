//! Named provider registry.
//!
//! Maps a stable provider key (`"openai"`, `"deepseek"`, …) to its client and
//! ordered model catalog. The registry is an explicit value handed to the
//! orchestrator; there is no process-global provider list.

use std::collections::BTreeMap;

use tracing::info;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, LlmResponse, PromptMessage, ProviderError, providers};

/// A registered backend: client plus the models it serves.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub key: String,
    pub models: Vec<String>,
    pub provider: LlmProvider,
}

/// A resolved (provider, model) pair ready to be invoked.
#[derive(Debug, Clone)]
pub struct InvocationTarget {
    pub provider_key: String,
    pub model: String,
    provider: LlmProvider,
}

impl InvocationTarget {
    pub fn new(provider_key: impl Into<String>, model: impl Into<String>, provider: LlmProvider) -> Self {
        Self { provider_key: provider_key.into(), model: model.into(), provider }
    }

    pub async fn invoke(
        &self,
        messages: &[PromptMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<LlmResponse, ProviderError> {
        self.provider.complete(&self.model, messages, temperature, max_tokens).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderSpec>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled provider in `config`. Fails on the first provider
    /// that cannot be constructed (e.g. a missing credential).
    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        for p in &config.providers {
            let provider = providers::build(p)?;
            info!(provider = %p.key, models = ?p.models, "llm provider registered");
            registry.register(p.key.clone(), p.models.clone(), provider)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        models: Vec<String>,
        provider: LlmProvider,
    ) -> Result<(), ProviderError> {
        let key = key.into();
        if self.providers.contains_key(&key) {
            return Err(ProviderError::Duplicate(key));
        }
        self.providers.insert(key.clone(), ProviderSpec { key, models, provider });
        Ok(())
    }

    fn spec(&self, provider_key: &str) -> Result<&ProviderSpec, ProviderError> {
        self.providers
            .get(provider_key)
            .ok_or_else(|| ProviderError::UnknownProvider(provider_key.to_string()))
    }

    /// Resolve `provider_key` and the model at `model_index` in its catalog.
    pub fn select(&self, provider_key: &str, model_index: usize) -> Result<InvocationTarget, ProviderError> {
        let spec = self.spec(provider_key)?;
        let model = spec.models.get(model_index).ok_or_else(|| ProviderError::ModelIndex {
            provider: provider_key.to_string(),
            index: model_index,
            len: spec.models.len(),
        })?;
        Ok(InvocationTarget::new(&spec.key, model, spec.provider.clone()))
    }

    /// Resolve `provider_key` and a model by its id.
    pub fn select_model(&self, provider_key: &str, model: &str) -> Result<InvocationTarget, ProviderError> {
        let spec = self.spec(provider_key)?;
        if !spec.models.iter().any(|m| m == model) {
            return Err(ProviderError::UnknownModel {
                provider: provider_key.to_string(),
                model: model.to_string(),
            });
        }
        Ok(InvocationTarget::new(&spec.key, model, spec.provider.clone()))
    }

    /// Resolve the deployment's configured target: `[llm] default` + `model`,
    /// falling back to the provider's first model.
    pub fn select_configured(&self, config: &LlmConfig) -> Result<InvocationTarget, ProviderError> {
        match &config.model {
            Some(model) => self.select_model(&config.provider, model),
            None => self.select(&config.provider, 0),
        }
    }

    /// Registered provider keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
