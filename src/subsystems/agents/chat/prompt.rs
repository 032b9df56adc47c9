//! Prompt assembly for the RAG chat agent.
//!
//! Every prompt is exactly three messages:
//!
//! ```text
//! system     profile (persona, fixed per deployment)
//! user       instruction (task framing)
//! assistant  "Query: …\n\nContext: […]\n\nHistory: [(role, text), …]\n\n"
//! ```
//!
//! Section labels and order are fixed; identical inputs render to
//! byte-identical output.

use crate::llm::{PromptMessage, Role};
use crate::subsystems::memory::{ChatTurn, ContextChunk};

pub const QUERY_LABEL: &str = "Query: ";
pub const CONTEXT_LABEL: &str = "Context: ";
pub const HISTORY_LABEL: &str = "History: ";

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(
        profile: &str,
        instruction: &str,
        query: &str,
        history: &[ChatTurn],
        context: &[ContextChunk],
    ) -> Vec<PromptMessage> {
        vec![
            PromptMessage::new(Role::System, profile),
            PromptMessage::new(Role::User, instruction),
            PromptMessage::new(Role::Assistant, Self::render_body(query, history, context)),
        ]
    }

    /// The templated third message.
    pub fn render_body(query: &str, history: &[ChatTurn], context: &[ContextChunk]) -> String {
        format!(
            "{QUERY_LABEL}{query}\n\n{CONTEXT_LABEL}{}\n\n{HISTORY_LABEL}{}\n\n",
            Self::render_context(context),
            Self::render_history(history),
        )
    }

    /// Chunks as a list of quoted, escaped strings: `["a", "b"]`.
    pub fn render_context(context: &[ContextChunk]) -> String {
        let texts: Vec<&str> = context.iter().map(ContextChunk::text).collect();
        format!("{texts:?}")
    }

    /// Turns as a list of `(role, text)` pairs: `[("user", "hi")]`.
    pub fn render_history(history: &[ChatTurn]) -> String {
        let pairs: Vec<(&str, &str)> = history.iter().map(|t| (t.role().as_str(), t.text())).collect();
        format!("{pairs:?}")
    }
}
