use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::time::Instant;
use tracing::{debug, info};

use crate::handlers::session::{session_cookie, session_token};
use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse};
use crate::services::formatter::format_outcome;
use crate::services::prompt::{compose, Mode, Tone};
use crate::services::session::Resolved;
use crate::state::AppState;
use crate::utils::error::ApiError;

const INVALID_MESSAGE: &str = "Invalid message.";

/// Start or continue the caller's chat session.
pub async fn chat_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<ChatResponse>), ApiError> {
    let start_time = Instant::now();

    let Json(request) = payload.map_err(|e| {
        debug!("Rejected chat body: {}", e);
        ApiError::BadRequest(INVALID_MESSAGE.to_string())
    })?;

    // Validation happens before any session work
    let message = request
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest(INVALID_MESSAGE.to_string()))?;

    let presented = session_token(&jar, &state.settings);
    let resolved = state
        .registry
        .resolve_or_create(presented.as_deref(), request.reset)
        .await;

    let mode = Mode::parse(request.mode.as_deref());
    let tone = Tone::parse(request.tone.as_deref());

    info!(
        "Chat request: session={}, new={}, mode={:?}, tone={:?}, message_len={}",
        resolved.token.short(),
        resolved.created,
        mode,
        tone,
        message.len()
    );

    let messages = compose(&mode, &tone, &message);
    let response = match run_turn(&resolved, messages).await {
        Ok(response) => {
            state.registry.commit(&resolved).await;
            response
        }
        Err(e) => {
            state.registry.rollback(&resolved).await;
            return Err(e);
        }
    };

    let jar = if presented.as_deref() == Some(resolved.token.as_str()) {
        jar
    } else {
        jar.add(session_cookie(&state.settings, &resolved.token))
    };

    info!("Chat completed in {}ms", start_time.elapsed().as_millis());

    Ok((
        jar,
        Json(ChatResponse {
            status: "success",
            response,
        }),
    ))
}

async fn run_turn(resolved: &Resolved, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
    let outcome = resolved
        .agent
        .invoke(messages, resolved.token.as_str())
        .await?;

    let response = format_outcome(&outcome);
    if response.trim().is_empty() {
        return Err(ApiError::LlmError("model produced no usable content".to_string()));
    }
    Ok(response)
}
