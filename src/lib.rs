//! Convo Relay - conversation relay and durable log for A.B Deliveries
//!
//! Accepts chat messages, enriches them with a best-effort customer lookup,
//! asks a text-completion provider for a reply and records every exchange
//! in an append-only log that tolerates concurrent writers.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod relay;
pub mod storage;
pub mod utils;

pub use crate::config::Settings;
pub use error::{RelayError, RelayResult};
pub use relay::{ChatRequest, RelayHandler, RelayReply};

use crate::core::{HttpUserLookup, OpenAiCompletionClient};
use crate::storage::FileConversationLog;
use std::sync::Arc;

/// Wire the production relay: HTTP lookup, OpenAI completions and the
/// file-backed conversation log configured in `settings`.
pub async fn build_relay(settings: &Settings) -> anyhow::Result<RelayHandler> {
    let api_key = Settings::api_key();
    if api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; relay requests will fail until it is");
    }

    let log = FileConversationLog::new(settings.log.path.clone()).await?;
    tracing::info!("Conversation log at {:?}", log.path());

    Ok(RelayHandler::new(
        Arc::new(HttpUserLookup::new(settings.user_service.clone())),
        Arc::new(OpenAiCompletionClient::new(api_key, settings.llm.clone())),
        Arc::new(log),
    ))
}
