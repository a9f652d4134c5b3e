//! Maps relay errors to the `{ok: false, error}` envelope.

use crate::error::RelayError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// The relay refused or failed the request.
    Relay {
        error: RelayError,
        failure_message: &'static str,
    },
    /// The request body was not a valid relay request.
    Body(JsonRejection),
}

impl ApiError {
    /// `failure_message` is what the caller sees for server-side failures.
    pub fn new(error: RelayError, failure_message: &'static str) -> Self {
        ApiError::Relay {
            error,
            failure_message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Body(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Relay {
                error: RelayError::EmptyMessage,
                ..
            } => (
                StatusCode::BAD_REQUEST,
                RelayError::EmptyMessage.to_string(),
            ),
            ApiError::Relay {
                error,
                failure_message,
            } => {
                tracing::error!("❌ {}: {}", failure_message, error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    failure_message.to_string(),
                )
            }
        };

        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_is_server_error() {
        let response = ApiError::new(
            RelayError::Configuration("missing key".to_string()),
            "Chat service failed",
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_message_is_bad_request() {
        let response = ApiError::new(RelayError::EmptyMessage, "Chat service failed").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
