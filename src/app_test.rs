use super::*;
use crate::api::ProjectStatus;
use crate::config::PollPolicy;
use crate::generation::{PollResponse, SubmitResponse, TaskId};
use crate::notify::NotificationKind;
use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Copy)]
enum Script {
    Complete,
    Fail,
    Hang,
}

struct MockBackend {
    script: Script,
    submits: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl MockBackend {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, submits: AtomicUsize::new(0), last_request: Mutex::new(None) })
    }
}

#[async_trait::async_trait]
impl GenerationBackend for MockBackend {
    async fn submit(&self, _kind: GenerationKind, request: &GenerationRequest) -> Result<SubmitResponse, GenerationError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(SubmitResponse { task_id: Some("task-1".into()) })
    }

    async fn poll(&self, _task_id: &TaskId) -> Result<PollResponse, GenerationError> {
        Ok(match self.script {
            Script::Complete => PollResponse::completed("Be Bold."),
            Script::Fail => PollResponse::failed("model overloaded"),
            Script::Hang => PollResponse::pending(),
        })
    }
}

fn config(api_url: &str) -> ClientConfig {
    ClientConfig {
        api_url: api_url.to_string(),
        poll: PollPolicy {
            interval: Duration::from_millis(20),
            max_attempts: 5,
            transport_retries: 0,
            retry_base: Duration::from_millis(5),
        },
        notification_ttl: Duration::from_secs(60),
        ..ClientConfig::default()
    }
}

fn app_with(api_url: &str, backend: Arc<MockBackend>) -> App {
    let config = config(api_url);
    let api = ApiClient::new(&config.api_url, config.timeouts).unwrap();
    App::from_parts(config, Arc::new(DemoAuthenticator::new()), backend, api)
}

fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn get_preferences(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(query.get("email").map(String::as_str), Some("alex@genify.com"));
    Json(json!({ "tone": "playful", "style": "punchy", "sample": "Go green.\nStay bold." }))
}

async fn list_projects() -> Json<Value> {
    let project = |id: &str, title: &str, status: &str| {
        json!({ "id": id, "title": title, "description": "", "status": status, "team": [], "tasks": [] })
    };
    Json(json!({ "projects": [
        project("p1", "Q2 Marketing Campaign", "In Progress"),
        project("p2", "Holiday Emails", "Done"),
    ]}))
}

async fn spawn_api() -> String {
    let app = Router::new()
        .route("/api/brand/preferences", get(get_preferences))
        .route("/api/projects", get(list_projects));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn kinds(app: &App) -> Vec<NotificationKind> {
    app.notifications().list().into_iter().map(|n| n.kind).collect()
}

// =============================================================
// construction
// =============================================================

#[test]
fn start_builds_http_clients() {
    let app = App::start(ClientConfig::default()).unwrap();
    assert!(!app.session().is_authenticated());
    assert!(!app.is_shut_down());
}

// =============================================================
// generation
// =============================================================

#[tokio::test]
async fn generate_requires_a_session() {
    let backend = MockBackend::new(Script::Complete);
    let app = app_with(&unreachable_url(), backend.clone());

    let out = app
        .generate(GenerationKind::Blog, GenerationRequest::new("a post"), &app.cancellation())
        .await;

    assert!(out.is_none());
    assert_eq!(backend.submits.load(Ordering::SeqCst), 0);
    assert_eq!(kinds(&app), vec![NotificationKind::Warning]);
}

#[tokio::test]
async fn generate_success_notifies_once() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();

    let out = app
        .generate(GenerationKind::Caption, GenerationRequest::new("a caption"), &app.cancellation())
        .await;

    assert_eq!(out.as_deref(), Some("Be Bold."));
    let shown = app.notifications().list();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].kind, NotificationKind::Success);
    assert_eq!(shown[0].message, "Caption generated.");
}

#[tokio::test]
async fn generate_failure_notifies_once() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Fail));
    app.login("alex@genify.com", "pw").await.unwrap();

    let out = app
        .generate(GenerationKind::Email, GenerationRequest::new("an email"), &app.cancellation())
        .await;

    assert!(out.is_none());
    assert_eq!(kinds(&app), vec![NotificationKind::Error]);
}

#[tokio::test]
async fn cancelled_generation_is_silent() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Hang));
    app.login("alex@genify.com", "pw").await.unwrap();
    let cancel = app.cancellation();
    cancel.cancel();

    let out = app.generate(GenerationKind::General, GenerationRequest::new("hi"), &cancel).await;

    assert!(out.is_none());
    assert!(app.notifications().is_empty());
    assert!(!app.is_shut_down(), "child cancellation must not stop the app");
}

#[tokio::test]
async fn shutdown_stops_outstanding_polls() {
    let app = Arc::new(app_with(&unreachable_url(), MockBackend::new(Script::Hang)));
    app.login("alex@genify.com", "pw").await.unwrap();

    let worker = {
        let app = app.clone();
        tokio::spawn(async move {
            let cancel = app.cancellation();
            app.generate(GenerationKind::Article, GenerationRequest::new("long read"), &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    app.shutdown();

    assert!(worker.await.unwrap().is_none());
    assert!(app.is_shut_down());
    assert!(app.cancellation().is_cancelled());
    assert!(app.notifications().is_empty());
}

// =============================================================
// brand voice
// =============================================================

#[tokio::test]
async fn brand_voice_fills_unset_tone_params() {
    let backend = MockBackend::new(Script::Complete);
    let app = app_with(&spawn_api().await, backend.clone());
    app.login("alex@genify.com", "pw").await.unwrap();

    let prefs = app.load_brand_voice().await.unwrap();
    assert_eq!(prefs.samples(), ("Go green.", "Stay bold."));
    assert_eq!(app.brand_voice(), Some(prefs));

    let request = GenerationRequest::new("a caption")
        .with_params(ToneParams { style: Some("formal".into()), ..Default::default() });
    app.generate(GenerationKind::Caption, request, &app.cancellation()).await.unwrap();

    let sent = backend.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent.params.tone.as_deref(), Some("playful"));
    assert_eq!(sent.params.style.as_deref(), Some("formal"));
    assert_eq!(sent.params.sample.as_deref(), Some("Go green.\nStay bold."));
}

#[tokio::test]
async fn failed_brand_voice_save_notifies_and_keeps_cache() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();

    let saved = app
        .save_brand_voice(BrandPreferences::with_samples("calm", "short", "a", "b"))
        .await;

    assert!(!saved);
    assert!(app.brand_voice().is_none());
    assert_eq!(kinds(&app), vec![NotificationKind::Error]);
}

#[tokio::test]
async fn logout_forgets_brand_voice() {
    let app = app_with(&spawn_api().await, MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();
    app.load_brand_voice().await.unwrap();

    app.logout();
    assert!(app.brand_voice().is_none());
    assert!(!app.session().is_authenticated());
}

// =============================================================
// projects
// =============================================================

#[tokio::test]
async fn projects_are_fetched_and_filtered() {
    let app = app_with(&spawn_api().await, MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();

    let filter = ProjectFilter { status: Some(ProjectStatus::Done), ..Default::default() };
    let projects = app.projects(&filter).await.unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].title, "Holiday Emails");
    assert!(app.notifications().is_empty());
}

#[tokio::test]
async fn unreachable_api_degrades_to_a_notification() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();

    assert!(app.projects(&ProjectFilter::default()).await.is_none());
    assert!(app.project("p1").await.is_none());
    assert_eq!(kinds(&app), vec![NotificationKind::Error, NotificationKind::Error]);
}

// =============================================================
// chat
// =============================================================

#[tokio::test]
async fn chat_round_trip_through_app() {
    let app = app_with(&unreachable_url(), MockBackend::new(Script::Complete));
    app.login("alex@genify.com", "pw").await.unwrap();
    let mut chat = ChatState::new();

    let reply = app.chat(&mut chat, "hello", &app.cancellation()).await.unwrap();
    assert_eq!(reply.text, "Be Bold.");
    assert_eq!(chat.messages.len(), 2);
}
