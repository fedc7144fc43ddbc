//! Client tests against a loopback axum server.

use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use inlay_common::sse::{ChatStreamError, ChatStreamHandler};
use inlay_common::wire::{ChatRequest, SaveMeta, SaveRequest};
use inlay_common::{ApiClient, CancellationToken, EditorConfig, ManifestError};
use serde_json::json;
use url::Url;

async fn serve(app: Router) -> EditorConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let site = Url::parse(&format!("http://{addr}")).unwrap();
    let mut config = EditorConfig::for_site(site).unwrap();
    config.request_timeout = Duration::from_secs(5);
    config
}

#[derive(Default)]
struct Recorder {
    tokens: Vec<String>,
    statuses: Vec<String>,
    done: Vec<Option<String>>,
    errors: Vec<ChatStreamError>,
}

impl ChatStreamHandler for Recorder {
    fn on_token(&mut self, token: &str, _full_text: &str) {
        self.tokens.push(token.to_string());
    }

    fn on_status(&mut self, status: &str, _message: Option<&str>) {
        self.statuses.push(status.to_string());
    }

    fn on_done(&mut self, summary: Option<String>) {
        self.done.push(summary);
    }

    fn on_error(&mut self, error: ChatStreamError) {
        self.errors.push(error);
    }
}

impl Recorder {
    fn terminal_calls(&self) -> usize {
        self.done.len() + self.errors.len()
    }
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        message: "make the title shorter".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fetch_manifest_merges_both_sources() {
    let app = Router::new()
        .route(
            "/about.json",
            get(|| async {
                Json(json!({
                    "entries": { "cms-1": { "id": "cms-1", "tag": "h1", "text": "About" } },
                    "componentDefinitions": { "Hero": { "name": "Hero", "file": "page-copy" } }
                }))
            }),
        )
        .route(
            "/cms-manifest.json",
            get(|| async {
                Json(json!({
                    "componentDefinitions": { "Hero": { "name": "Hero", "file": "src/Hero.astro" } }
                }))
            }),
        );
    let client = ApiClient::new(&serve(app).await);

    let manifest = client.fetch_manifest("/about/").await.unwrap();
    assert_eq!(manifest.entries["cms-1"].text, "About");
    assert_eq!(manifest.component_definitions["Hero"].file, "src/Hero.astro");
}

#[tokio::test]
async fn test_fetch_manifest_survives_missing_global() {
    let app = Router::new().route(
        "/index.json",
        get(|| async { Json(json!({ "entries": { "cms-0": { "id": "cms-0" } } })) }),
    );
    let client = ApiClient::new(&serve(app).await);

    let manifest = client.fetch_manifest("/").await.unwrap();
    assert!(manifest.entries.contains_key("cms-0"));
}

#[tokio::test]
async fn test_fetch_manifest_fails_when_both_missing() {
    let client = ApiClient::new(&serve(Router::new()).await);

    let err = client.fetch_manifest("/").await.unwrap_err();
    assert!(matches!(err, ManifestError::AllSourcesFailed));
    assert_eq!(err.to_string(), "Failed to load manifest from all sources");
}

#[tokio::test]
async fn test_save_changes_round_trip() {
    let app = Router::new().route(
        "/_cms/update",
        post(|Json(body): Json<SaveRequest>| async move {
            Json(json!({
                "updated": body.changes.len() - 1,
                "errors": [{ "cmsId": body.changes[0].cms_id, "error": "snippet not found" }]
            }))
        }),
    );
    let client = ApiClient::new(&serve(app).await);

    let request = SaveRequest {
        changes: vec![
            inlay_common::wire::ChangePayload {
                cms_id: "a".into(),
                ..Default::default()
            },
            inlay_common::wire::ChangePayload {
                cms_id: "b".into(),
                ..Default::default()
            },
        ],
        meta: SaveMeta {
            source: "inlay".into(),
            url: "/".into(),
        },
    };
    let response = client.save_changes(&request).await.unwrap();
    assert_eq!(response.updated, 1);
    assert_eq!(response.errors.unwrap()[0].cms_id, "a");
}

#[tokio::test]
async fn test_request_timeout_is_reported() {
    let app = Router::new().route(
        "/_cms/deployment/status",
        get(|| async { std::future::pending::<&'static str>().await }),
    );
    let mut config = serve(app).await;
    config.request_timeout = Duration::from_millis(50);
    let client = ApiClient::new(&config);

    let err = client.deployment_status().await.unwrap_err();
    assert!(matches!(err, inlay_common::ApiError::Timeout { .. }));
}

#[tokio::test]
async fn test_stream_chat_dispatches_events() {
    let body = concat!(
        "data: {\"type\":\"status\",\"status\":\"thinking\"}\n\n",
        "data: {\"type\":\"token\",\"token\":\"Hi\",\"fullText\":\"Hi\"}\n\n",
        "data: {broken\n\n",
        "data: {\"type\":\"token\",\"token\":\"!\",\"fullText\":\"Hi!\"}\n\n",
        "data: {\"type\":\"done\",\"summary\":\"shortened\"}\n\n",
    );
    let app = Router::new().route(
        "/_cms/ai/chat",
        post(move || async move { ([(CONTENT_TYPE, "text/event-stream")], body) }),
    );
    let client = ApiClient::new(&serve(app).await);

    let mut recorder = Recorder::default();
    client
        .stream_chat(&chat_request(), &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(recorder.statuses, vec!["thinking"]);
    assert_eq!(recorder.tokens, vec!["Hi", "!"]);
    assert_eq!(recorder.done, vec![Some("shortened".to_string())]);
    assert_eq!(recorder.terminal_calls(), 1);
}

#[tokio::test]
async fn test_stream_chat_flushes_trailing_line() {
    // no newline after the sentinel
    let body = "data: {\"type\":\"token\",\"token\":\"a\",\"fullText\":\"a\"}\ndata: [DONE]";
    let app = Router::new().route(
        "/_cms/ai/chat",
        post(move || async move { ([(CONTENT_TYPE, "text/event-stream")], body) }),
    );
    let client = ApiClient::new(&serve(app).await);

    let mut recorder = Recorder::default();
    client
        .stream_chat(&chat_request(), &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(recorder.tokens, vec!["a"]);
    assert_eq!(recorder.done, vec![None]);
    assert!(recorder.errors.is_empty());
}

#[tokio::test]
async fn test_stream_chat_error_event_is_terminal() {
    let body = "data: {\"type\":\"error\",\"error\":\"rate limited\",\"code\":\"429\"}\n\ndata: {\"type\":\"done\"}\n";
    let app = Router::new().route(
        "/_cms/ai/chat",
        post(move || async move { ([(CONTENT_TYPE, "text/event-stream")], body) }),
    );
    let client = ApiClient::new(&serve(app).await);

    let mut recorder = Recorder::default();
    client
        .stream_chat(&chat_request(), &mut recorder, &CancellationToken::new())
        .await;

    assert!(recorder.done.is_empty());
    assert_eq!(
        recorder.errors,
        vec![ChatStreamError::Remote {
            error: "rate limited".into(),
            code: Some("429".into())
        }]
    );
}

#[tokio::test]
async fn test_stream_chat_cancelled_calls_error_once() {
    let app = Router::new().route(
        "/_cms/ai/chat",
        post(|| async { std::future::pending::<&'static str>().await }),
    );
    let client = ApiClient::new(&serve(app).await);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut recorder = Recorder::default();
    client.stream_chat(&chat_request(), &mut recorder, &cancel).await;

    assert_eq!(recorder.errors, vec![ChatStreamError::Cancelled]);
    assert_eq!(recorder.terminal_calls(), 1);
}

#[tokio::test]
async fn test_stream_chat_timeout_calls_error_once() {
    let app = Router::new().route(
        "/_cms/ai/chat",
        post(|| async { std::future::pending::<&'static str>().await }),
    );
    let mut config = serve(app).await;
    config.stream_timeout = Duration::from_millis(50);
    let client = ApiClient::new(&config);

    let mut recorder = Recorder::default();
    client
        .stream_chat(&chat_request(), &mut recorder, &CancellationToken::new())
        .await;

    assert_eq!(recorder.errors, vec![ChatStreamError::Timeout]);
    assert_eq!(recorder.terminal_calls(), 1);
}
