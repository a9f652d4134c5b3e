use super::prompt;
use crate::core::{CompletionClient, UserLookup};
use crate::error::{RelayError, RelayResult};
use crate::storage::{ConversationLog, ConversationRecord, NOT_PROVIDED};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Inbound message, shared by the chat and registration paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "name", default)]
    pub caller_name: Option<String>,
    #[serde(rename = "phone", default)]
    pub caller_phone: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "sessionId", alias = "session_id", default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.caller_name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.caller_phone = Some(phone.into());
        self
    }

    fn name(&self) -> Option<&str> {
        non_blank(self.caller_name.as_deref())
    }

    fn phone(&self) -> Option<&str> {
        non_blank(self.caller_phone.as_deref())
    }

    /// `name (phone)` for log lines.
    fn caller_label(&self) -> String {
        format!(
            "{} ({})",
            self.name().unwrap_or(prompt::UNKNOWN_CALLER),
            self.phone().unwrap_or(NOT_PROVIDED)
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReply {
    pub reply: String,
}

/// Orchestrates lookup, completion and logging for each inbound message.
///
/// A reply is returned only after its exchange has been appended to the log.
/// Lookup and provider faults degrade to a still-useful reply; the only
/// errors returned are [`RelayError::Configuration`] and
/// [`RelayError::EmptyMessage`].
#[derive(Clone)]
pub struct RelayHandler {
    lookup: Arc<dyn UserLookup>,
    completion: Arc<dyn CompletionClient>,
    log: Arc<dyn ConversationLog>,
}

impl RelayHandler {
    pub fn new(
        lookup: Arc<dyn UserLookup>,
        completion: Arc<dyn CompletionClient>,
        log: Arc<dyn ConversationLog>,
    ) -> Self {
        Self {
            lookup,
            completion,
            log,
        }
    }

    pub async fn handle_chat(&self, request: &ChatRequest) -> RelayResult<RelayReply> {
        let span = tracing::info_span!(
            "chat",
            session_id = request.session_id.as_deref().unwrap_or("-")
        );

        async {
            ensure_message(request)?;
            tracing::info!(
                "[RelayHandler] New chat request from {}",
                request.caller_label()
            );

            let lookup = self.lookup.lookup(request.phone()).await;
            if !lookup.found {
                tracing::debug!("[RelayHandler] No customer record, replying without history");
            }

            let prompt = prompt::chat_prompt(request.name(), &request.message, &lookup);
            self.complete_and_log(request, &prompt).await
        }
        .instrument(span)
        .await
    }

    pub async fn handle_registration_greeting(
        &self,
        request: &ChatRequest,
    ) -> RelayResult<RelayReply> {
        let span = tracing::info_span!(
            "register_toast",
            session_id = request.session_id.as_deref().unwrap_or("-")
        );

        async {
            ensure_message(request)?;
            tracing::info!(
                "[RelayHandler] Register-toast request from {}",
                request.name().unwrap_or(prompt::UNKNOWN_CALLER)
            );

            let prompt =
                prompt::registration_prompt(request.name(), request.phone(), &request.message);
            self.complete_and_log(request, &prompt).await
        }
        .instrument(span)
        .await
    }

    async fn complete_and_log(
        &self,
        request: &ChatRequest,
        prompt: &str,
    ) -> RelayResult<RelayReply> {
        let outcome = self.completion.complete(prompt).await?;
        if !outcome.succeeded {
            tracing::warn!("[RelayHandler] Completion failed, replying with fallback text");
        }

        let record = ConversationRecord::new(
            request.name(),
            request.phone(),
            request.message.clone(),
            outcome.reply_text.clone(),
        );
        self.log.append(record).await;

        Ok(RelayReply {
            reply: outcome.reply_text,
        })
    }
}

fn ensure_message(request: &ChatRequest) -> RelayResult<()> {
    if request.message.trim().is_empty() {
        return Err(RelayError::EmptyMessage);
    }
    Ok(())
}
