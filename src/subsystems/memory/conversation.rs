//! Per-session conversation history.
//!
//! Sessions live in an index (`RwLock<HashMap<..>>`) of independently
//! locked turn vectors, so writers on different sessions never contend and
//! writers on the same session are serialised. Reads clone out of the lock.
//!
//! Retention is unbounded unless a cap is set, in which case the oldest
//! turns are evicted a whole exchange at a time and the retained history
//! always starts on a user turn. `clear` drops the session's entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One stored message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    role: TurnRole,
    text: String,
    at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self { role, text: text.into(), at: Utc::now() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, text)
    }

    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the turn was recorded.
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

type Turns = Arc<Mutex<Vec<ChatTurn>>>;

#[derive(Debug, Default)]
pub struct ConversationState {
    sessions: RwLock<HashMap<SessionId, Turns>>,
    cap: Option<usize>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `cap` turns per session. The cap is rounded down to a
    /// whole number of exchanges, never below one exchange.
    pub fn with_cap(cap: Option<usize>) -> Self {
        let cap = cap.filter(|c| *c > 0).map(|c| (c - c % 2).max(2));
        Self { sessions: RwLock::new(HashMap::new()), cap }
    }

    fn existing(&self, session: &SessionId) -> Option<Turns> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session).cloned()
    }

    fn entry(&self, session: &SessionId) -> Turns {
        if let Some(turns) = self.existing(session) {
            return turns;
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(session.clone()).or_default().clone()
    }

    fn push_all(&self, session: &SessionId, new: impl IntoIterator<Item = ChatTurn>) {
        let turns = self.entry(session);
        let mut turns = turns.lock().unwrap_or_else(PoisonError::into_inner);
        turns.extend(new);
        if let Some(cap) = self.cap
            && turns.len() > cap
        {
            // Evict up to the next user turn so no orphaned reply leads.
            let mut evict = turns.len() - cap;
            while evict < turns.len() && turns[evict].role() != TurnRole::User {
                evict += 1;
            }
            turns.drain(..evict);
        }
    }

    /// At most the last `k` turns of `session`, oldest first. Empty for an
    /// unknown or cleared session.
    pub fn get_recent(&self, session: &SessionId, k: usize) -> Vec<ChatTurn> {
        let Some(turns) = self.existing(session) else {
            return Vec::new();
        };
        let turns = turns.lock().unwrap_or_else(PoisonError::into_inner);
        let start = turns.len().saturating_sub(k);
        turns[start..].to_vec()
    }

    pub fn append_turn(&self, session: &SessionId, turn: ChatTurn) {
        self.push_all(session, [turn]);
    }

    /// Append `(user, query)` then `(assistant, answer)` under one lock so
    /// no other writer can land between them.
    pub fn append_exchange(&self, session: &SessionId, query: &str, answer: &str) {
        self.push_all(session, [ChatTurn::user(query), ChatTurn::assistant(answer)]);
    }

    /// Reset `session` to empty and forget it.
    pub fn clear(&self, session: &SessionId) {
        let removed = self.sessions.write().unwrap_or_else(PoisonError::into_inner).remove(session);
        if let Some(turns) = removed {
            turns.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Every retained turn of `session`, for export.
    pub fn history(&self, session: &SessionId) -> Vec<ChatTurn> {
        self.get_recent(session, usize::MAX)
    }

    pub fn len(&self, session: &SessionId) -> usize {
        self.existing(session)
            .map(|t| t.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }
}
