use super::*;
use crate::config::PollPolicy;
use crate::generation::GenerationClient;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Backend {
    polls: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn submit(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    *backend.last_body.lock().unwrap() = Some(body);
    Json(json!({ "task_id": "abc" }))
}

async fn result(State(backend): State<Backend>, Path(task_id): Path<String>) -> (StatusCode, Json<Value>) {
    if task_id != "abc" {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": "unknown task" })));
    }
    let n = backend.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if n < 4 {
        (StatusCode::OK, Json(json!({ "status": "pending" })))
    } else {
        (StatusCode::OK, Json(json!({ "status": "completed", "output": { "response": "Be Bold." } })))
    }
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_generation_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/generate", post(submit))
        .route("/generate/blog", post(submit))
        .route("/generate/result/{task_id}", get(result))
        .with_state(backend.clone());
    (spawn_server(app).await, backend)
}

fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: std::time::Duration::from_millis(10),
        max_attempts: 10,
        transport_retries: 0,
        retry_base: std::time::Duration::from_millis(5),
    }
}

#[tokio::test]
async fn submit_then_poll_over_http() {
    let (url, state) = spawn_generation_backend().await;
    let backend = HttpBackend::new(&url, HttpTimeouts::default()).unwrap();
    let client = GenerationClient::new(Arc::new(backend), fast_policy());

    let request = GenerationRequest::new("write a tagline")
        .with_params(crate::generation::ToneParams { tone: Some("bold".into()), ..Default::default() });
    let result = client
        .generate(GenerationKind::General, request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, "Be Bold.");
    assert_eq!(state.polls.load(Ordering::SeqCst), 4);
    assert_eq!(
        state.last_body.lock().unwrap().clone(),
        Some(json!({ "prompt": "write a tagline", "tone": "bold" }))
    );
}

#[tokio::test]
async fn kind_selects_submit_path() {
    let (url, _state) = spawn_generation_backend().await;
    let backend = HttpBackend::new(&url, HttpTimeouts::default()).unwrap();

    let resp = backend
        .submit(GenerationKind::Blog, &GenerationRequest::new("post"))
        .await
        .unwrap();
    assert_eq!(resp.task_id.as_deref(), Some("abc"));

    let err = backend
        .submit(GenerationKind::Hashtags, &GenerationRequest::new("post"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Submission { ref reason } if reason.starts_with("HTTP 404")));
}

#[tokio::test]
async fn unknown_task_is_non_retryable_transport_error() {
    let (url, _state) = spawn_generation_backend().await;
    let backend = HttpBackend::new(&url, HttpTimeouts::default()).unwrap();

    let err = backend.poll(&TaskId::new("nope")).await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport { status: Some(404), .. }));
}

#[tokio::test]
async fn unreachable_endpoint_fails_submission() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}"), HttpTimeouts::default()).unwrap();
    let err = backend
        .submit(GenerationKind::General, &GenerationRequest::new("hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Submission { .. }));
}

#[test]
fn malformed_poll_body_is_transport_error() {
    let err = parse_poll_response(200, "<html>oops</html>").unwrap_err();
    assert!(matches!(err, GenerationError::Transport { status: Some(200), ref message } if message.contains("invalid poll response")));
}

#[test]
fn base_url_is_normalized() {
    let backend = HttpBackend::new("http://localhost:8000/", HttpTimeouts::default()).unwrap();
    assert_eq!(backend.base_url(), "http://localhost:8000");
}

async fn echo_task_id(Path(task_id): Path<String>) -> Json<Value> {
    Json(json!({ "status": "completed", "output": { "response": task_id } }))
}

#[tokio::test]
async fn task_id_is_sent_as_a_single_path_segment() {
    let app = Router::new().route("/generate/result/{task_id}", get(echo_task_id));
    let backend = HttpBackend::new(&spawn_server(app).await, HttpTimeouts::default()).unwrap();

    for raw in ["a/b", "x?status=completed", "frag#ment", "100%"] {
        let resp = backend.poll(&TaskId::new(raw)).await.unwrap();
        assert_eq!(resp.response_text(), Some(raw));
    }
}

#[tokio::test]
async fn base_path_prefix_is_kept() {
    let app = Router::new().route("/svc/generate/result/{task_id}", get(echo_task_id));
    let url = format!("{}/svc/", spawn_server(app).await);
    let backend = HttpBackend::new(&url, HttpTimeouts::default()).unwrap();

    let resp = backend.poll(&TaskId::new("abc")).await.unwrap();
    assert_eq!(resp.response_text(), Some("abc"));
}

#[test]
fn unparseable_base_url_is_rejected() {
    let err = HttpBackend::new("not a url", HttpTimeouts::default()).err().unwrap();
    assert!(matches!(err, GenerationError::HttpClientBuild(_)));
}
