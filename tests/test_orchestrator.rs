//! End-to-end behaviour of the query cycle against the offline provider.

use std::sync::Arc;
use std::time::Duration;

use smx_chat::llm::providers::dummy::{DummyBehavior, DummyProvider};
use smx_chat::llm::{CompletionSettings, InvocationTarget, LlmProvider, Role};
use smx_chat::subsystems::agents::chat::{ChatSettings, QueryOrchestrator, QueryOutcome};
use smx_chat::subsystems::memory::{ContextChunk, ContextStore, ConversationState, SessionId, TurnRole};

fn settings(retries: u32) -> ChatSettings {
    ChatSettings {
        profile: "You are a test assistant.".into(),
        instruction: "Answer from the context.".into(),
        history_window: 10,
        completion: CompletionSettings {
            timeout: Duration::from_secs(5),
            retries,
            ..CompletionSettings::default()
        },
    }
}

fn orchestrator(dummy: &DummyProvider, retries: u32) -> QueryOrchestrator {
    QueryOrchestrator::new(
        InvocationTarget::new("dummy", "echo", LlmProvider::Dummy(dummy.clone())),
        Arc::new(ContextStore::new(vec![
            ContextChunk::system("RAG retrieves passages."),
            ContextChunk::system("CRAG grades them."),
        ])),
        Arc::new(ConversationState::new()),
        settings(retries),
    )
}

#[tokio::test]
async fn test_prompt_carries_profile_instruction_and_body() {
    let dummy = DummyProvider::new(DummyBehavior::Reply("RAG is retrieval plus generation.".into()));
    let orch = orchestrator(&dummy, 0);
    let id = SessionId::from("s1");

    let out = orch.handle(&id, "What is RAG?").await;
    assert_eq!(out, QueryOutcome::Answer("RAG is retrieval plus generation.".into()));

    let prompt = dummy.last_prompt();
    assert_eq!(prompt.len(), 3);
    assert_eq!(prompt[0].role, Role::System);
    assert_eq!(prompt[0].content, "You are a test assistant.");
    assert_eq!(prompt[1].role, Role::User);
    assert_eq!(prompt[1].content, "Answer from the context.");
    assert_eq!(prompt[2].role, Role::Assistant);
    assert_eq!(
        prompt[2].content,
        "Query: What is RAG?\n\nContext: [\"RAG retrieves passages.\", \"CRAG grades them.\"]\n\nHistory: []\n\n"
    );
}

#[tokio::test]
async fn test_second_query_sees_first_exchange() {
    let dummy = DummyProvider::echo();
    let orch = orchestrator(&dummy, 0);
    let id = SessionId::from("s1");

    orch.handle(&id, "first").await;
    orch.handle(&id, "second").await;

    let body = &dummy.last_prompt()[2].content;
    assert!(body.contains("History: [(\"user\", \"first\"), (\"assistant\", \"[echo] Query: first\")]"));
    assert_eq!(orch.conversation().len(&id), 4);
}

#[tokio::test]
async fn test_retries_record_a_single_exchange() {
    let dummy = DummyProvider::new(DummyBehavior::FailTimes(2));
    let orch = orchestrator(&dummy, 2);
    let id = SessionId::from("s1");

    let out = orch.handle(&id, "flaky?").await;
    assert_eq!(out.answer(), Some("[echo] Query: flaky?"));
    assert_eq!(dummy.calls(), 3);
    assert_eq!(orch.conversation().len(&id), 2);
}

#[tokio::test]
async fn test_exhausted_retries_answer_with_error() {
    let dummy = DummyProvider::new(DummyBehavior::FailTimes(5));
    let orch = orchestrator(&dummy, 1);
    let id = SessionId::from("s1");

    let answer = orch.handle(&id, "flaky?").await.answer().unwrap().to_string();
    assert!(answer.starts_with("Error: "), "got {answer}");
    assert_eq!(dummy.calls(), 2);

    let turns = orch.conversation().history(&id);
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role(), TurnRole::Assistant);
    assert_eq!(turns[1].text(), answer);
}

#[tokio::test]
async fn test_sessions_do_not_share_history() {
    let dummy = DummyProvider::echo();
    let orch = Arc::new(orchestrator(&dummy, 0));

    let mut handles = Vec::new();
    for s in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let id = SessionId::new(format!("session-{s}"));
            for q in 0..5 {
                orch.handle(&id, &format!("s{s} q{q}")).await;
            }
            id
        }));
    }

    for h in handles {
        let id = h.await.unwrap();
        let turns = orch.conversation().history(&id);
        assert_eq!(turns.len(), 10);
        let prefix = format!("s{}", id.as_str().trim_start_matches("session-"));
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role(), TurnRole::User);
            assert!(pair[0].text().starts_with(&prefix));
            assert_eq!(pair[1].role(), TurnRole::Assistant);
        }
    }
    assert_eq!(dummy.calls(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_session_queries_are_serialised() {
    let dummy = DummyProvider::echo();
    let orch = Arc::new(orchestrator(&dummy, 0));
    let id = SessionId::from("shared");

    let handles: Vec<_> = (0..50)
        .map(|q| {
            let orch = orch.clone();
            let id = id.clone();
            tokio::spawn(async move { orch.handle(&id, &format!("q{q}")).await })
        })
        .collect();
    for h in handles {
        assert!(h.await.unwrap().answer().is_some());
    }

    let turns = orch.conversation().history(&id);
    assert_eq!(turns.len(), 100);
    let mut seen = std::collections::HashSet::new();
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role(), TurnRole::User);
        assert_eq!(pair[1].role(), TurnRole::Assistant);
        assert_eq!(pair[1].text(), format!("[echo] Query: {}", pair[0].text()));
        assert!(seen.insert(pair[0].text().to_string()), "duplicate {}", pair[0].text());
    }
    assert_eq!(seen.len(), 50);
    assert_eq!(dummy.calls(), 50);
}

#[tokio::test]
async fn test_clear_keeps_uploaded_context() {
    let dummy = DummyProvider::echo();
    let orch = orchestrator(&dummy, 0);
    let id = SessionId::from("s1");

    orch.context().add_session_chunks(&id, ["my upload"]);
    orch.handle(&id, "q1").await;
    orch.conversation().clear(&id);
    assert_eq!(orch.conversation().len(&id), 0);

    orch.handle(&id, "q2").await;
    let body = &dummy.last_prompt()[2].content;
    assert!(body.contains("\"my upload\""));
    assert!(body.contains("History: []"));
}

#[tokio::test]
async fn test_uploads_are_scoped_to_their_session() {
    let dummy = DummyProvider::echo();
    let orch = orchestrator(&dummy, 0);
    let a = SessionId::from("a");
    let b = SessionId::from("b");

    orch.context().add_session_chunks(&a, ["only for a"]);
    orch.handle(&b, "q").await;
    assert!(!dummy.last_prompt()[2].content.contains("only for a"));

    orch.handle(&a, "q").await;
    assert!(dummy.last_prompt()[2].content.contains("only for a"));
}
