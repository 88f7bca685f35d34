//! HTTP Endpoints
//!
//! Voice webhooks for the telephony provider, the operator API and health
//! checks.

use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use hotline_agent::{CaseStatus, TurnResponse};
use hotline_core::SpeechInput;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_enabled = state.config.server.cors_enabled;

    let router = Router::new()
        // Telephony webhooks
        .route("/voice/incoming", post(incoming_call))
        .route("/voice/speech", post(speech))
        .route("/voice/audio/:id", get(prompt_audio))

        // Operator API
        .route("/admin/cases", get(list_cases))
        .route("/admin/callbacks", get(list_callbacks))
        .route("/admin/cases/:reference/status", post(update_status))

        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))

        // Middleware
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// One turn as returned to the telephony provider
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBody {
    #[serde(flatten)]
    pub turn: TurnResponse,
    pub audio_url: Option<String>,
}

async fn with_audio(state: &AppState, turn: TurnResponse) -> TurnBody {
    let audio_url = state.voice.render(&turn.response_text).await;
    TurnBody { turn, audio_url }
}

/// New call request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingCall {
    call_id: String,
    #[serde(default)]
    caller_number: Option<String>,
}

/// Answer a call with the opening prompt
async fn incoming_call(
    State(state): State<AppState>,
    Json(request): Json<IncomingCall>,
) -> Result<Json<TurnBody>, ServerError> {
    let call_id = request.call_id.trim();
    if call_id.is_empty() {
        return Err(ServerError::InvalidRequest("callId must not be empty".to_string()));
    }

    let turn = state.flow.greet(call_id, request.caller_number.as_deref());
    Ok(Json(with_audio(&state, turn).await))
}

/// Handle one recognised utterance
async fn speech(
    State(state): State<AppState>,
    Json(mut input): Json<SpeechInput>,
) -> Result<Json<TurnBody>, ServerError> {
    input.call_id = input.call_id.trim().to_string();
    if input.call_id.is_empty() {
        return Err(ServerError::InvalidRequest("callId must not be empty".to_string()));
    }

    let turn = state.flow.handle_speech(input).await;
    Ok(Json(with_audio(&state, turn).await))
}

/// Serve cached prompt audio
async fn prompt_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let audio = Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.voice.audio(&id))
        .ok_or_else(|| ServerError::NotFound(format!("audio {}", id)))?;

    Ok(([(header::CONTENT_TYPE, audio.mime_type.clone())], audio.bytes.clone()))
}

/// List urgent cases
async fn list_cases(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cases = state.registry.list_urgent_cases();
    Json(serde_json::json!({
        "count": cases.len(),
        "cases": cases,
    }))
}

/// List scheduled callbacks
async fn list_callbacks(State(state): State<AppState>) -> Json<serde_json::Value> {
    let callbacks = state.registry.list_scheduled_callbacks();
    Json(serde_json::json!({
        "count": callbacks.len(),
        "callbacks": callbacks,
    }))
}

/// Status update request
#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

/// Change a case's status
async fn update_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<hotline_persistence::StatusUpdate>, ServerError> {
    let status: CaseStatus = request.status.parse()?;
    let update = state
        .registry
        .update_case_status(&reference, status, request.notes)
        .await?;
    Ok(Json(update))
}

/// Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.flow.store().len();

    Json(serde_json::json!({
        "status": "ready",
        "sessions": sessions,
        "speech": state.voice.is_enabled(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotline_config::Settings;

    #[test]
    fn test_router_creation() {
        let mut settings = Settings::default();
        settings.llm.enabled = false;
        let state = AppState::new(settings).unwrap();
        let _ = create_router(state);
    }

    #[test]
    fn test_turn_body_shape() {
        let body = TurnBody {
            turn: TurnResponse {
                response_text: "Goodbye.".to_string(),
                should_prompt_again: false,
                next_stage: "callback_complete".to_string(),
                reference_number: Some("CBK-000001".to_string()),
            },
            audio_url: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["responseText"], "Goodbye.");
        assert_eq!(json["shouldPromptAgain"], false);
        assert_eq!(json["referenceNumber"], "CBK-000001");
        assert!(json["audioUrl"].is_null());
    }
}
