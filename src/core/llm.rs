use crate::config::LLMConfig;
use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Reply produced for a single prompt.
///
/// When the provider fails, `succeeded` is false and `reply_text` holds the
/// configured apology so callers always have something to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub reply_text: String,
    pub succeeded: bool,
}

impl CompletionOutcome {
    pub fn success(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            succeeded: true,
        }
    }

    pub fn fallback(reply_text: impl Into<String>) -> Self {
        Self {
            reply_text: reply_text.into(),
            succeeded: false,
        }
    }
}

/// Text-completion capability used by the relay.
///
/// Implementations make exactly one attempt per call. Provider faults are
/// folded into a fallback outcome; only configuration problems are errors.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> RelayResult<CompletionOutcome>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible chat completions client
pub struct OpenAiCompletionClient {
    client: Client,
    api_key: Option<String>,
    config: LLMConfig,
}

impl OpenAiCompletionClient {
    pub fn new(api_key: Option<String>, config: LLMConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn request_reply(&self, api_key: &str, prompt: &str) -> RelayResult<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.config.persona.clone()),
                ChatMessage::user(prompt),
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::CompletionProvider(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RelayError::CompletionProvider(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| RelayError::CompletionProvider(format!("Response decode error: {}", e)))?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| RelayError::CompletionProvider("response had no content".to_string()))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, prompt: &str) -> RelayResult<CompletionOutcome> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RelayError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        match self.request_reply(api_key, prompt).await {
            Ok(reply) => Ok(CompletionOutcome::success(reply)),
            Err(e) => {
                tracing::warn!("[CompletionClient] {}", e);
                Ok(CompletionOutcome::fallback(self.config.fallback_reply.clone()))
            }
        }
    }
}
