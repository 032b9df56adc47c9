//! Context chunk store.
//!
//! System chunks are fixed at construction; session chunks arrive through
//! upload events. Assembly is flat concatenation, system first, with no
//! ranking or filtering.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use super::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkScope {
    System,
    Session,
}

/// An immutable block of background text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChunk {
    text: String,
    scope: ChunkScope,
    session: Option<SessionId>,
}

impl ContextChunk {
    pub fn system(text: impl Into<String>) -> Self {
        Self { text: text.into(), scope: ChunkScope::System, session: None }
    }

    pub fn session(session: SessionId, text: impl Into<String>) -> Self {
        Self { text: text.into(), scope: ChunkScope::Session, session: Some(session) }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn scope(&self) -> ChunkScope {
        self.scope
    }

    /// Owning session; `None` for system chunks.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }
}

#[derive(Debug, Default)]
pub struct ContextStore {
    system: Vec<ContextChunk>,
    sessions: RwLock<HashMap<SessionId, Vec<ContextChunk>>>,
}

impl ContextStore {
    /// Build a store around an already-loaded system corpus.
    pub fn new(system: Vec<ContextChunk>) -> Self {
        Self { system, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn system_chunks(&self) -> &[ContextChunk] {
        &self.system
    }

    /// Chunks uploaded by `session`, in upload order; empty if none.
    pub fn get_session_chunks(&self, session: &SessionId) -> Vec<ContextChunk> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(session).cloned().unwrap_or_default()
    }

    /// Record an upload event. Blank texts are dropped; returns how many
    /// chunks were stored.
    pub fn add_session_chunks<I, S>(&self, session: &SessionId, texts: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let new: Vec<ContextChunk> = texts
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .map(|t| ContextChunk::session(session.clone(), t))
            .collect();
        let added = new.len();
        if added > 0 {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.entry(session.clone()).or_default().extend(new);
        }
        debug!(%session, added, "session chunks added");
        added
    }

    /// Drop every chunk uploaded by `session`. Returns how many were removed.
    pub fn clear_session_chunks(&self, session: &SessionId) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session).map(|c| c.len()).unwrap_or(0)
    }

    /// Full prompt context for `session`: system chunks, then session chunks.
    pub fn assemble(&self, session: &SessionId) -> Vec<ContextChunk> {
        let mut out = self.system.clone();
        out.extend(self.get_session_chunks(session));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContextStore {
        ContextStore::new(vec![ContextChunk::system("sys-a"), ContextChunk::system("sys-b")])
    }

    fn texts(chunks: &[ContextChunk]) -> Vec<&str> {
        chunks.iter().map(ContextChunk::text).collect()
    }

    #[test]
    fn unknown_session_has_no_chunks() {
        assert!(store().get_session_chunks(&"nobody".into()).is_empty());
    }

    #[test]
    fn system_chunks_precede_session_chunks() {
        let s = store();
        let id = SessionId::from("s1");
        s.add_session_chunks(&id, ["up-1", "up-2"]);

        let ctx = s.assemble(&id);
        assert_eq!(texts(&ctx), ["sys-a", "sys-b", "up-1", "up-2"]);
        assert_eq!(ctx[0].scope(), ChunkScope::System);
        assert_eq!(ctx[2].session_id(), Some(&id));
        // identical inputs give identical assembly
        assert_eq!(s.assemble(&id), ctx);
    }

    #[test]
    fn sessions_do_not_see_each_other() {
        let s = store();
        s.add_session_chunks(&"a".into(), ["only-a"]);
        assert_eq!(texts(&s.assemble(&"b".into())), ["sys-a", "sys-b"]);
    }

    #[test]
    fn blank_uploads_are_dropped() {
        let s = store();
        let id = SessionId::from("s1");
        assert_eq!(s.add_session_chunks(&id, ["  ", "", "text"]), 1);
        assert_eq!(texts(&s.get_session_chunks(&id)), ["text"]);
    }

    #[test]
    fn clear_removes_only_session_chunks() {
        let s = store();
        let id = SessionId::from("s1");
        s.add_session_chunks(&id, ["x", "y"]);
        assert_eq!(s.clear_session_chunks(&id), 2);
        assert!(s.get_session_chunks(&id).is_empty());
        assert_eq!(s.system_chunks().len(), 2);
    }
}
