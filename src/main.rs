//! SMX console assistant — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (profile + provider credentials resolved here)
//!   3. Init logger at configured level
//!   4. Build provider registry and resolve the configured target
//!   5. Load system context chunks
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run the console channel until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use smx_chat::config;
use smx_chat::error::AppError;
use smx_chat::llm::ProviderRegistry;
use smx_chat::logger;
use smx_chat::subsystems::agents::chat::{ChatSettings, QueryOrchestrator};
use smx_chat::subsystems::comms::PtyChannel;
use smx_chat::subsystems::memory::{ContextStore, ConversationState, SessionId, loader};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let config = config::load()?;
    logger::init(&config.log_level)?;

    info!(
        app = %config.app_name,
        provider = %config.llm.provider,
        log_level = %config.log_level,
        "config loaded"
    );

    let registry = ProviderRegistry::from_config(&config.llm)
        .map_err(|e| AppError::Config(e.to_string()))?;
    info!(providers = ?registry.keys().collect::<Vec<_>>(), "providers registered");
    let target = registry
        .select_configured(&config.llm)
        .map_err(|e| AppError::Config(e.to_string()))?;
    info!(provider = %target.provider_key, model = %target.model, "llm target selected");

    let system_chunks = match &config.context.docs_dir {
        Some(dir) => loader::load_system_chunks(dir, config.context.chunk_size)?,
        None => Vec::new(),
    };

    let orchestrator = Arc::new(QueryOrchestrator::new(
        target,
        Arc::new(ContextStore::new(system_chunks)),
        Arc::new(ConversationState::with_cap(config.chat.history_cap)),
        ChatSettings::from_config(&config.chat),
    ));

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — shutting down");
            ctrl_c.cancel();
        }
    });

    let session = SessionId::generate();
    info!(%session, "console session started");
    PtyChannel::new(session, config.context.chunk_size)
        .run(orchestrator, shutdown)
        .await
}
