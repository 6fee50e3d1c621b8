use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use grammo_api_server::{
    build_router,
    config::{
        settings::{LlmConfig, LoggingConfig, MarkerConfig, PromptsConfig, ServerConfig, SessionConfig},
        MarkerBackend, RunMode, Settings,
    },
    models::chat::{ChatMessage, SessionToken},
    services::{session::InMemoryMarkerCache, ChatModel, SessionRegistry},
    AppState,
};

/// Replies with a fixed string and counts calls. Fails every call from
/// `fail_from` on.
struct StubModel {
    reply: String,
    calls: AtomicUsize,
    fail_from: usize,
}

impl StubModel {
    fn new(reply: &str) -> Arc<Self> {
        Self::failing_after(reply, usize::MAX)
    }

    fn failing_after(reply: &str, fail_from: usize) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0), fail_from })
    }
}

#[async_trait::async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reply == "FAIL" || call >= self.fail_from {
            anyhow::bail!("upstream unavailable");
        }
        Ok(self.reply.clone())
    }
}

fn settings(mode: RunMode) -> Settings {
    Settings {
        server: ServerConfig { host: "127.0.0.1".into(), port: 0, mode },
        session: SessionConfig {
            cookie_name: "gm_session".into(),
            max_age_secs: 86400,
            idle_timeout_secs: 86400,
            sweep_interval_secs: 600,
        },
        marker: MarkerConfig {
            backend: MarkerBackend::Memory,
            redis_url: String::new(),
            key_prefix: "chat_session_".into(),
            ttl_secs: 86400,
        },
        llm: LlmConfig {
            base_url: "http://localhost".into(),
            model: "stub".into(),
            api_key: "test".into(),
            timeout_seconds: 5,
            max_tokens: 64,
            temperature: 0.0,
            max_history_messages: 10,
        },
        prompts: PromptsConfig::default(),
        logging: LoggingConfig::default(),
    }
}

fn app_with(model: Arc<StubModel>, mode: RunMode) -> (Router, Arc<SessionRegistry>) {
    let markers = Arc::new(InMemoryMarkerCache::new("chat_session_", Duration::from_secs(3600)));
    let registry = Arc::new(SessionRegistry::new(model, markers, "SYSTEM", 10));
    let app = build_router(AppState::new(settings(mode), registry.clone()));
    (app, registry)
}

fn app(model: Arc<StubModel>) -> (Router, Arc<SessionRegistry>) {
    app_with(model, RunMode::Development)
}

fn chat(body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("gm_session={}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn end(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/end");
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, format!("gm_session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn token_from(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("gm_session="))
        .unwrap()
        .to_string()
}

const CORRECTION: &str = r#"{"original":"She don't like apples.","task_type":"correction","output":"She doesn't like apples.","explanation":"Subject-verb agreement."}"#;

#[tokio::test]
async fn hello_returns_greeting() {
    let (app, _) = app(StubModel::new("unused"));
    let response = app
        .oneshot(Request::builder().uri("/hello").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"message": "Hello from Grammo!"}));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (app, _) = app(StubModel::new("unused"));
    let response = app
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"status": "error", "response": "Not found"}));
}

#[tokio::test]
async fn chat_rejects_missing_or_empty_message() {
    let model = StubModel::new("unused");
    let (app, registry) = app(model.clone());

    for body in [json!({}), json!({"message": ""}), json!({"mode": "grammar", "tone": "formal"})] {
        let response = app.clone().oneshot(chat(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"status": "error", "response": "Invalid message."})
        );
    }

    let malformed = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(malformed).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(registry.is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chat_grammar_correction_sets_cookie() {
    let (app, registry) = app(StubModel::new(CORRECTION));

    let response = app
        .oneshot(chat(json!({"message": "She don't like apples.", "mode": "grammar", "tone": "default"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response).expect("session cookie set");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"));

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    let text = body["response"].as_str().unwrap();
    let label = text.find("Correction").unwrap();
    let original = text.find("She don't like apples.").unwrap();
    let output = text.find("She doesn't like apples.").unwrap();
    let explanation = text.find("Explanation").unwrap();
    assert!(label < original && original < output && output < explanation);

    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn production_cookie_is_cross_site() {
    let (app, _) = app_with(StubModel::new(CORRECTION), RunMode::Production);
    let response = app
        .oneshot(chat(json!({"message": "hi"}), None))
        .await
        .unwrap();

    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));
}

#[tokio::test]
async fn chat_with_cookie_reuses_session() {
    let (app, registry) = app(StubModel::new(r#"{"task_type":"follow-up","output":"Which language?"}"#));

    let first = app.clone().oneshot(chat(json!({"message": "translate this"}), None)).await.unwrap();
    let token = token_from(&set_cookie(&first).unwrap());

    let second = app
        .oneshot(chat(json!({"message": "translate it to French"}), Some(&token)))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::OK);
    assert!(set_cookie(&second).is_none());
    assert_eq!(json_body(second).await["response"], "Which language?");

    assert_eq!(registry.len(), 1);
    let agent = registry.get(&SessionToken::new(token.as_str())).unwrap();
    assert_eq!(agent.history(&token).len(), 4);
}

#[tokio::test]
async fn reset_issues_new_cookie() {
    let (app, registry) = app(StubModel::new("plain text"));

    let first = app.clone().oneshot(chat(json!({"message": "a"}), None)).await.unwrap();
    let old = token_from(&set_cookie(&first).unwrap());

    let second = app
        .oneshot(chat(json!({"message": "b", "reset": true}), Some(&old)))
        .await
        .unwrap();
    let new = token_from(&set_cookie(&second).expect("new cookie on reset"));

    assert_ne!(old, new);
    assert_eq!(registry.len(), 1);
    assert!(registry.get(&SessionToken::new(old.as_str())).is_none());
}

#[tokio::test]
async fn model_failure_is_server_error() {
    let (app, registry) = app(StubModel::new("FAIL"));
    let response = app.oneshot(chat(json!({"message": "hello"}), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response).is_none());
    assert_eq!(json_body(response).await, json!({"status": "error", "response": "Server Error"}));
    // No client holds the token, so no agent may outlive the request
    assert!(registry.is_empty());
}

#[tokio::test]
async fn empty_model_output_is_server_error() {
    let (app, registry) = app(StubModel::new(r#"{"task_type":"invalid","output":""}"#));
    let response = app.oneshot(chat(json!({"message": "hello"}), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn failed_reset_keeps_current_session() {
    let (app, registry) = app(StubModel::failing_after("plain text", 1));

    let first = app.clone().oneshot(chat(json!({"message": "a"}), None)).await.unwrap();
    let old = token_from(&set_cookie(&first).unwrap());

    let second = app
        .oneshot(chat(json!({"message": "b", "reset": true}), Some(&old)))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&second).is_none());
    assert_eq!(registry.len(), 1);
    let agent = registry.get(&SessionToken::new(old.as_str())).expect("old session kept");
    assert_eq!(agent.history(&old).len(), 2);
}

#[tokio::test]
async fn wrong_method_is_json_405() {
    let (app, _) = app(StubModel::new("unused"));
    let response = app
        .oneshot(Request::builder().uri("/chat").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        json_body(response).await,
        json!({"status": "error", "response": "Method not allowed"})
    );
}

#[tokio::test]
async fn end_session_lifecycle() {
    let (app, registry) = app(StubModel::new("ok"));

    let response = app.clone().oneshot(end(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"status": "error", "response": "No active session."}));

    let first = app.clone().oneshot(chat(json!({"message": "hi"}), None)).await.unwrap();
    let token = token_from(&set_cookie(&first).unwrap());

    let response = app.clone().oneshot(end(Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie(&response).expect("cookie removal");
    assert!(cleared.starts_with("gm_session="));
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(
        json_body(response).await,
        json!({"status": "success", "message": "Session ended successfully"})
    );
    assert!(registry.is_empty());

    let response = app.oneshot(end(Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_sessions() {
    let (app, _) = app(StubModel::new("ok"));
    app.clone().oneshot(chat(json!({"message": "hi"}), None)).await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_sessions"], 1);
}

