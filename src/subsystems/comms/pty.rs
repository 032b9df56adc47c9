//! PTY (console) comms channel — reads lines from stdin, runs them through
//! the [`QueryOrchestrator`], prints the answer to stdout.
//!
//! One console is one session. Lines starting with `/` are commands:
//!
//! ```text
//! /clear           reset this session's conversation
//! /upload <path>   add a document to this session's context
//! /history         print every retained turn
//! /quit            leave
//! ```
//!
//! Runs until the `shutdown` token is cancelled (Ctrl-C), stdin is closed,
//! or `/quit`. Ctrl-C during a query also cancels the provider call.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::subsystems::agents::chat::{QueryOrchestrator, QueryOutcome};
use crate::subsystems::memory::{SessionId, loader};

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Query(String),
    Clear,
    Upload(PathBuf),
    History,
    Quit,
    Unknown(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(cmd) = trimmed.strip_prefix('/') else {
            // Blank lines go through as queries; the orchestrator decides.
            return ConsoleCommand::Query(line.to_string());
        };
        let (name, arg) = cmd.split_once(char::is_whitespace).unwrap_or((cmd, ""));
        match (name, arg.trim()) {
            ("clear", _) => ConsoleCommand::Clear,
            ("history", _) => ConsoleCommand::History,
            ("quit" | "exit", _) => ConsoleCommand::Quit,
            ("upload", "") => ConsoleCommand::Unknown("usage: /upload <path>".into()),
            ("upload", path) => ConsoleCommand::Upload(PathBuf::from(path)),
            _ => ConsoleCommand::Unknown(format!("unknown command: /{name}")),
        }
    }
}

pub struct PtyChannel {
    session: SessionId,
    chunk_size: usize,
}

impl PtyChannel {
    pub fn new(session: SessionId, chunk_size: usize) -> Self {
        Self { session, chunk_size }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Apply one command. Returns the text to print, or `None` to stop.
    pub async fn dispatch(
        &self,
        orchestrator: &QueryOrchestrator,
        command: ConsoleCommand,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let session = &self.session;
        let reply = match command {
            ConsoleCommand::Quit => return None,
            ConsoleCommand::Query(q) => match orchestrator.handle_with_cancel(session, &q, cancel).await {
                QueryOutcome::Answer(text) => text,
                QueryOutcome::Empty => "[warn] Please enter a query.".to_string(),
            },
            ConsoleCommand::Clear => {
                orchestrator.conversation().clear(session);
                info!(%session, "conversation cleared");
                "[info] Conversation cleared.".to_string()
            }
            ConsoleCommand::Upload(path) => match loader::load_upload(&path, self.chunk_size, session) {
                Ok(texts) => {
                    let added = orchestrator.context().add_session_chunks(session, texts);
                    format!("[info] Added {added} chunk(s) from {}.", path.display())
                }
                Err(e) => {
                    warn!(%session, error = %e, "upload failed");
                    format!("[error] {e}")
                }
            },
            ConsoleCommand::History => render_history(orchestrator, session),
            ConsoleCommand::Unknown(msg) => format!("[warn] {msg}"),
        };
        Some(reply)
    }

    pub async fn run(
        self,
        orchestrator: Arc<QueryOrchestrator>,
        shutdown: CancellationToken,
    ) -> Result<(), AppError> {
        info!(session = %self.session, "pty channel started — type a message and press Enter. Ctrl-C to quit.");
        println!("─────────────────────────────────");
        println!(" SMX console  (/quit or Ctrl-C)");
        println!("─────────────────────────────────");

        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();

        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    println!("\n[pty] shutdown signal received — closing console");
                    info!("pty channel shutting down");
                    break;
                }

                line = lines.next_line() => {
                    match line {
                        Err(e) => {
                            return Err(AppError::Comms(format!("pty read error: {e}")));
                        }
                        Ok(None) => {
                            info!("pty stdin closed");
                            break;
                        }
                        Ok(Some(input)) => {
                            debug!(input = %input, "pty received line");
                            let command = ConsoleCommand::parse(&input);
                            match self.dispatch(&orchestrator, command, &shutdown).await {
                                Some(reply) => println!("{reply}"),
                                None => break,
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn render_history(orchestrator: &QueryOrchestrator, session: &SessionId) -> String {
    let turns = orchestrator.conversation().history(session);
    if turns.is_empty() {
        return "[info] No history.".to_string();
    }
    turns
        .iter()
        .map(|t| format!("{} {:>9}: {}", t.at().format("%H:%M:%S"), t.role(), t.text()))
        .collect::<Vec<_>>()
        .join("\n")
}
