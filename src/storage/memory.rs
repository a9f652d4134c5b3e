//! In-Memory Conversation Log
//!
//! Suitable for tests and for embedding the relay without a log file.
//! Records are lost when the process terminates.

use super::{ConversationLog, ConversationRecord};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct InMemoryConversationLog {
    records: Arc<Mutex<Vec<ConversationRecord>>>,
}

impl InMemoryConversationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationLog for InMemoryConversationLog {
    async fn append(&self, record: ConversationRecord) {
        let mut records = self.records.lock().await;
        records.push(record);
        tracing::debug!("[InMemoryConversationLog] Holding {} records", records.len());
    }

    async fn records(&self) -> Result<Vec<ConversationRecord>> {
        Ok(self.records.lock().await.clone())
    }
}
