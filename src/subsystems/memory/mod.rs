//! Memory subsystem — in-process session state.
//!
//! Two stores, both keyed by [`SessionId`] and both shared via `Arc`:
//!
//! ```text
//! ContextStore       system chunks (loaded once) + per-session uploads
//! ConversationState  per-session ordered turn history
//! ```
//!
//! Nothing here touches disk after startup; the chunk loader reads the
//! configured docs directory once.

pub mod context;
pub mod conversation;
pub mod loader;

use std::fmt;

pub use context::{ChunkScope, ContextChunk, ContextStore};
pub use conversation::{ChatTurn, ConversationState, TurnRole};

/// Opaque session identifier supplied by the comms layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered id for a new console session.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
