//! Retrieval-augmented chat agent.
//!
//! ```text
//! QueryOrchestrator::handle()
//!     ├─ ContextStore::assemble()       system ++ session chunks
//!     ├─ ConversationState::get_recent()
//!     ├─ PromptBuilder::build()         three role-tagged messages
//!     └─ InvocationTarget::invoke()     via ProviderRegistry
//! ```

pub mod orchestrator;
pub mod prompt;

pub use orchestrator::{ChatSettings, ERROR_PREFIX, QueryOrchestrator, QueryOutcome};
pub use prompt::PromptBuilder;
