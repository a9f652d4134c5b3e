//! Conversation Log Storage
//!
//! Information Hiding:
//! - File format, staging and side-file naming hidden behind the trait
//! - Per-file exclusive access hidden inside the file backend
//! - Callers only append; no backend ever edits or deletes a record

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod filesystem;
mod lock;
pub mod memory;

pub use filesystem::FileConversationLog;
pub use memory::InMemoryConversationLog;

/// Placeholder written for a caller field that was not supplied.
pub const NOT_PROVIDED: &str = "לא צוין";

/// One relayed exchange. Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub name: String,
    pub phone: String,
    pub message: String,
    pub reply: String,
    #[serde(rename = "time")]
    pub timestamp: String,
}

impl ConversationRecord {
    /// Build a record stamped with the current local time. Missing or blank
    /// caller fields become [`NOT_PROVIDED`].
    pub fn new(
        name: Option<&str>,
        phone: Option<&str>,
        message: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            name: or_not_provided(name),
            phone: or_not_provided(phone),
            message: message.into(),
            reply: reply.into(),
            timestamp: chrono::Local::now()
                .format("%-d.%-m.%Y, %H:%M:%S")
                .to_string(),
        }
    }
}

fn or_not_provided(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_PROVIDED)
        .to_string()
}

/// Append-only conversation log
#[async_trait]
pub trait ConversationLog: Send + Sync {
    /// Durably append exactly one record.
    ///
    /// Write faults are absorbed by the backend (logged, and for the file
    /// backend redirected to a side file); this never fails the caller.
    async fn append(&self, record: ConversationRecord);

    /// Read back every record currently held in the primary log.
    async fn records(&self) -> Result<Vec<ConversationRecord>>;
}
