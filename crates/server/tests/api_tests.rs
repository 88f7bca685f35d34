use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use hotline_agent::{CallFlow, CallFlowConfig, InMemorySessionStore};
use hotline_config::Settings;
use hotline_llm::{LlmError, SpeechSynthesizer, SynthesizedAudio};
use hotline_persistence::DiscardSink;
use hotline_server::{create_router, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;

struct FakeVoice;

#[async_trait]
impl SpeechSynthesizer for FakeVoice {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, LlmError> {
        Ok(SynthesizedAudio {
            bytes: text.as_bytes().to_vec(),
            mime_type: "audio/mpeg".to_string(),
        })
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.llm.enabled = false;
    settings
}

fn app() -> Router {
    create_router(AppState::new(test_settings()).unwrap())
}

fn app_with_voice() -> Router {
    let settings = test_settings();
    let flow = CallFlow::new(
        CallFlowConfig::from_settings(&settings),
        Arc::new(InMemorySessionStore::new(Duration::from_secs(60), 100)),
        None,
        Arc::new(DiscardSink),
    );
    create_router(AppState::from_parts(settings, flow, Some(Arc::new(FakeVoice))))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn say(app: &Router, call_id: &str, transcript: &str) -> Value {
    let (status, json) = send(
        app,
        post_json(
            "/voice/speech",
            json!({ "callId": call_id, "transcript": transcript, "recognitionConfidence": 0.9 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app();

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");

    let (status, json) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sessions"], 0);
    assert_eq!(json["speech"], false);
}

#[tokio::test]
async fn test_incoming_call_greets() {
    let app = app();

    let (status, json) = send(
        &app,
        post_json("/voice/incoming", json!({ "callId": "CA100", "callerNumber": "+15550100" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["nextStage"], "initial");
    assert_eq!(json["shouldPromptAgain"], true);
    assert!(json["audioUrl"].is_null());

    let (_, ready) = send(&app, get("/ready")).await;
    assert_eq!(ready["sessions"], 1);
}

#[tokio::test]
async fn test_empty_call_id_is_rejected() {
    let app = app();
    let (status, json) = send(
        &app,
        post_json("/voice/speech", json!({ "callId": "  ", "transcript": "our site is down" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("callId"));
}

#[tokio::test]
async fn test_urgent_call_shows_up_for_operators() {
    let app = app();

    let first = say(&app, "CA200", "our website is completely down and customers can't pay").await;
    assert_eq!(first["nextStage"], "urgent_details");

    say(&app, "CA200", "the checkout page returns an error for everyone").await;
    let done = say(&app, "CA200", "22 Queen Street, Leeds").await;
    assert_eq!(done["nextStage"], "urgent_complete");
    assert_eq!(done["shouldPromptAgain"], false);
    let reference = done["referenceNumber"].as_str().unwrap().to_string();
    assert!(reference.starts_with("UBG-"));

    let (status, cases) = send(&app, get("/admin/cases")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cases["count"], 1);
    assert_eq!(cases["cases"][0]["referenceNumber"], reference.as_str());
    assert_eq!(cases["cases"][0]["businessAddress"], "22 Queen Street, Leeds");
    assert_eq!(cases["cases"][0]["status"], "urgent_escalated");

    let (status, update) = send(
        &app,
        post_json(
            &format!("/admin/cases/{}/status", reference),
            json!({ "status": "in_progress", "notes": "technician dispatched" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["status"], "in_progress");

    let (_, cases) = send(&app, get("/admin/cases")).await;
    assert_eq!(cases["cases"][0]["status"], "in_progress");
    assert_eq!(cases["cases"][0]["notes"], "technician dispatched");
}

#[tokio::test]
async fn test_callback_listing() {
    let app = app();

    say(&app, "CA300", "I have a question about my invoice").await;
    say(&app, "CA300", "there is a charge I don't recognise").await;
    let done = say(&app, "CA300", "Thursday after 2pm").await;
    assert_eq!(done["nextStage"], "callback_complete");

    let (status, callbacks) = send(&app, get("/admin/callbacks")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(callbacks["count"], 1);
    assert_eq!(callbacks["callbacks"][0]["callbackTime"], "Thursday after 2pm");

    let (_, cases) = send(&app, get("/admin/cases")).await;
    assert_eq!(cases["count"], 0);
}

#[tokio::test]
async fn test_status_update_errors() {
    let app = app();

    let (status, _) = send(
        &app,
        post_json("/admin/cases/UBG-123456/status", json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json("/admin/cases/UBG-123456/status", json!({ "status": "finished" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synthesized_audio_is_served() {
    let app = app_with_voice();

    let (status, json) =
        send(&app, post_json("/voice/incoming", json!({ "callId": "CA400" }))).await;
    assert_eq!(status, StatusCode::OK);

    let url = json["audioUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:8080").unwrap();
    assert!(path.starts_with("/voice/audio/"));

    let response = app.clone().oneshot(get(path)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), json["responseText"].as_str().unwrap().as_bytes());

    let (status, _) = send(&app, get("/voice/audio/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let response = app().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = create_router(AppState::new(test_settings()).unwrap().with_metrics(handle));
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}
