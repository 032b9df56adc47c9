//! LLM provider implementations.
//!
//! `build(config)` is the factory — called once per enabled provider at
//! startup. Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::{ProviderConfig, ProviderKind};
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from one `[llm.providers.<key>]` section.
///
/// A provider that names an `api_key_env` must have a resolved key; a
/// missing credential is a startup failure, never a per-query one.
pub fn build(config: &ProviderConfig) -> Result<LlmProvider, ProviderError> {
    match config.kind {
        ProviderKind::Dummy => Ok(LlmProvider::Dummy(dummy::DummyProvider::echo())),
        ProviderKind::Openai => {
            if let (Some(env), None) = (&config.api_key_env, &config.api_key) {
                return Err(ProviderError::MissingCredential {
                    provider: config.key.clone(),
                    env: env.clone(),
                });
            }
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                config.api_base_url.clone(),
                config.api_key.clone(),
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai(api_key_env: Option<&str>, api_key: Option<&str>) -> ProviderConfig {
        ProviderConfig {
            key: "openai".into(),
            kind: ProviderKind::Openai,
            api_base_url: "http://localhost:0/v1/chat/completions".into(),
            api_key_env: api_key_env.map(String::from),
            api_key: api_key.map(String::from),
            models: vec!["gpt-4o-mini".into()],
        }
    }

    #[test]
    fn missing_credential_fails_fast() {
        let err = build(&openai(Some("OPENAI_API_KEY"), None)).unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential { .. }));
    }

    #[test]
    fn keyless_endpoint_builds() {
        assert!(matches!(build(&openai(None, None)), Ok(LlmProvider::OpenAiCompatible(_))));
    }

    #[test]
    fn keyed_endpoint_builds() {
        let p = build(&openai(Some("OPENAI_API_KEY"), Some("sk-test"))).unwrap();
        match p {
            LlmProvider::OpenAiCompatible(p) => {
                assert_eq!(p.api_base_url(), "http://localhost:0/v1/chat/completions")
            }
            other => panic!("unexpected provider: {other:?}"),
        }
    }
}
