//! Dummy LLM provider — answers offline without an API key.
//!
//! Default behaviour echoes the first line of the last prompt message
//! prefixed with `[echo]`. Other behaviours (fixed reply, failure, stall,
//! flaky) exist so the orchestrator's fail-soft paths can be driven from
//! tests and from a local config. Every call is counted and the last prompt
//! is kept for inspection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::llm::{LlmResponse, PromptMessage, ProviderError};

#[derive(Debug, Clone)]
pub enum DummyBehavior {
    Echo,
    Reply(String),
    Fail(String),
    /// Fail the first `n` calls, then echo.
    FailTimes(usize),
    /// Never resolve.
    Stall,
}

#[derive(Debug, Clone)]
pub struct DummyProvider {
    behavior: DummyBehavior,
    calls: Arc<AtomicUsize>,
    last_prompt: Arc<Mutex<Vec<PromptMessage>>>,
}

impl DummyProvider {
    pub fn new(behavior: DummyBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            last_prompt: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn echo() -> Self {
        Self::new(DummyBehavior::Echo)
    }

    /// Number of `complete` calls made so far, shared across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Messages of the most recent call; empty before the first one.
    pub fn last_prompt(&self) -> Vec<PromptMessage> {
        self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub async fn complete(
        &self,
        _model: &str,
        messages: &[PromptMessage],
    ) -> Result<LlmResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(PoisonError::into_inner) = messages.to_vec();
        let text = match &self.behavior {
            DummyBehavior::Echo => echo_text(messages),
            DummyBehavior::Reply(text) => text.clone(),
            DummyBehavior::Fail(msg) => return Err(ProviderError::Request(msg.clone())),
            DummyBehavior::FailTimes(k) if n < *k => {
                return Err(ProviderError::Request(format!("transient failure {}", n + 1)));
            }
            DummyBehavior::FailTimes(_) => echo_text(messages),
            DummyBehavior::Stall => std::future::pending().await,
        };
        Ok(LlmResponse { text, usage: None })
    }
}

fn echo_text(messages: &[PromptMessage]) -> String {
    let line = messages
        .last()
        .and_then(|m| m.content.lines().next())
        .unwrap_or_default();
    format!("[echo] {line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    fn prompt(last: &str) -> Vec<PromptMessage> {
        vec![
            PromptMessage::new(Role::System, "profile"),
            PromptMessage::new(Role::Assistant, last),
        ]
    }

    #[tokio::test]
    async fn echo_returns_first_line_of_last_message() {
        let p = DummyProvider::echo();
        let r = p.complete("echo", &prompt("Query: hi\n\nContext: []")).await.unwrap();
        assert_eq!(r.text, "[echo] Query: hi");
        assert!(r.usage.is_none());
        assert_eq!(p.last_prompt().len(), 2);
    }

    #[tokio::test]
    async fn echo_empty_prompt() {
        let p = DummyProvider::echo();
        assert_eq!(p.complete("echo", &[]).await.unwrap().text, "[echo] ");
    }

    #[tokio::test]
    async fn fail_times_recovers_and_counts_calls() {
        let p = DummyProvider::new(DummyBehavior::FailTimes(2));
        let clone = p.clone();
        assert!(p.complete("m", &prompt("q")).await.is_err());
        assert!(clone.complete("m", &prompt("q")).await.is_err());
        assert_eq!(p.complete("m", &prompt("q")).await.unwrap().text, "[echo] q");
        assert_eq!(p.calls(), 3);
        assert_eq!(clone.calls(), 3);
    }

    #[tokio::test]
    async fn fail_reports_request_error() {
        let p = DummyProvider::new(DummyBehavior::Fail("rate limited".into()));
        let err = p.complete("m", &prompt("q")).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }
}
