use super::error::ApiError;
use super::AppState;
use crate::relay::ChatRequest;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayResponse {
    pub ok: bool,
    pub reply: String,
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<RelayResponse>, ApiError> {
    let Json(request) = body?;
    let reply = state
        .relay
        .handle_chat(&request)
        .await
        .map_err(|e| ApiError::new(e, "Chat service failed"))?;

    Ok(Json(RelayResponse {
        ok: true,
        reply: reply.reply,
    }))
}

/// POST /register-toast
pub async fn register_toast(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<RelayResponse>, ApiError> {
    let Json(request) = body?;
    let reply = state
        .relay
        .handle_registration_greeting(&request)
        .await
        .map_err(|e| ApiError::new(e, "Register toast failed"))?;

    Ok(Json(RelayResponse {
        ok: true,
        reply: reply.reply,
    }))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "time": chrono::Utc::now().to_rfc3339() }))
}
