//! Relay error taxonomy
//!
//! Only `Configuration` and `EmptyMessage` ever cross the relay handler
//! boundary. The remaining variants describe faults that are absorbed where
//! they occur and exist so those sites log a uniform message.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The service cannot work at all, e.g. no completion credential.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("user lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("completion provider failure: {0}")]
    CompletionProvider(String),

    #[error("failed to write conversation log {path:?}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RelayResult<T> = Result<T, RelayError>;
