//! One query, one answer, one appended exchange.
//!
//! ```text
//! handle(session, query)
//!   ├─ blank query → QueryOutcome::Empty (no state change, no provider call)
//!   ├─ context  = system ++ session uploads
//!   ├─ history  = last K turns
//!   ├─ messages = PromptBuilder::build(..)
//!   ├─ invoke   (timeout, cancellation, retries) → text | "Error: …"
//!   └─ append (user, query), (assistant, answer)
//! ```
//!
//! Provider failures never escape: they come back as a normal answer string
//! and are stored like any other turn. Queries on the same session run one
//! at a time; different sessions run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::llm::{CompletionSettings, InvocationTarget, LlmResponse, PromptMessage, ProviderError};
use crate::subsystems::memory::{ContextStore, ConversationState, SessionId};

use super::prompt::PromptBuilder;

/// Prefix of every fail-soft answer.
pub const ERROR_PREFIX: &str = "Error: ";

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Result of [`QueryOrchestrator::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Provider text, or `"Error: …"` when the call failed.
    Answer(String),
    /// Blank query; nothing was sent or stored.
    Empty,
}

impl QueryOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            QueryOutcome::Answer(text) => Some(text),
            QueryOutcome::Empty => None,
        }
    }
}

/// Prompt framing and deployment constants.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub profile: String,
    pub instruction: String,
    /// Turns of history included in each prompt (K).
    pub history_window: usize,
    pub completion: CompletionSettings,
}

impl ChatSettings {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            profile: config.profile.clone(),
            instruction: config.instruction.clone(),
            history_window: config.history_window,
            completion: CompletionSettings {
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                timeout: Duration::from_secs(config.timeout_seconds),
                retries: config.retries,
            },
        }
    }
}

pub struct QueryOrchestrator {
    target: InvocationTarget,
    context: Arc<ContextStore>,
    conversation: Arc<ConversationState>,
    settings: ChatSettings,
    /// Per-session gates serialising whole request/response cycles. An entry
    /// lives only while a cycle on that session is running or queued.
    gates: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl QueryOrchestrator {
    pub fn new(
        target: InvocationTarget,
        context: Arc<ContextStore>,
        conversation: Arc<ConversationState>,
        settings: ChatSettings,
    ) -> Self {
        Self { target, context, conversation, settings, gates: Mutex::new(HashMap::new()) }
    }

    pub fn target(&self) -> &InvocationTarget {
        &self.target
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    fn gate(&self, session: &SessionId) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(session.clone()).or_default().clone()
    }

    /// Forget the session's gate once no other cycle holds or awaits it.
    fn release_gate(&self, session: &SessionId, gate: Arc<AsyncMutex<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here.
        if Arc::strong_count(&gate) == 2 {
            gates.remove(session);
        }
    }

    /// Run one query for `session` with no external cancellation.
    pub async fn handle(&self, session: &SessionId, raw_query: &str) -> QueryOutcome {
        self.handle_with_cancel(session, raw_query, &CancellationToken::new()).await
    }

    /// Run one query; cancelling `cancel` aborts the provider call and the
    /// exchange is still recorded with an error answer.
    pub async fn handle_with_cancel(
        &self,
        session: &SessionId,
        raw_query: &str,
        cancel: &CancellationToken,
    ) -> QueryOutcome {
        if raw_query.trim().is_empty() {
            debug!(%session, "blank query ignored");
            return QueryOutcome::Empty;
        }

        let gate = self.gate(session);
        let guard = gate.lock().await;

        let context = self.context.assemble(session);
        let history = self.conversation.get_recent(session, self.settings.history_window);
        let messages = PromptBuilder::build(
            &self.settings.profile,
            &self.settings.instruction,
            raw_query,
            &history,
            &context,
        );
        debug!(
            %session,
            context_chunks = context.len(),
            history_turns = history.len(),
            "prompt assembled"
        );

        let answer = match self.invoke(&messages, cancel).await {
            Ok(resp) => {
                if let Some(u) = &resp.usage {
                    debug!(input_tokens = u.input_tokens, output_tokens = u.output_tokens, "llm usage");
                }
                resp.text
            }
            Err(e) => {
                warn!(
                    %session,
                    provider = %self.target.provider_key,
                    model = %self.target.model,
                    error = %e,
                    "provider call failed"
                );
                format!("{ERROR_PREFIX}{e}")
            }
        };

        self.conversation.append_exchange(session, raw_query, &answer);
        drop(guard);
        self.release_gate(session, gate);
        info!(%session, answer_len = answer.len(), "query handled");
        QueryOutcome::Answer(answer)
    }

    /// The provider step: retries inside, bounded by the deadline and the
    /// cancellation token. Only the final outcome leaves this function.
    async fn invoke(
        &self,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, ProviderError> {
        let c = &self.settings.completion;
        let attempts = async {
            let mut attempt = 0u32;
            loop {
                match self.target.invoke(messages, c.temperature, c.max_tokens).await {
                    Ok(resp) => return Ok(resp),
                    Err(e) if attempt < c.retries => {
                        attempt += 1;
                        warn!(attempt, retries = c.retries, error = %e, "provider call failed, retrying");
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(ProviderError::Cancelled),

            result = tokio::time::timeout(c.timeout, attempts) => {
                result.unwrap_or(Err(ProviderError::Timeout(c.timeout)))
            }
        }
    }
}
