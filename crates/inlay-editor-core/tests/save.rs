//! Saving a session against a loopback API.

use std::rc::Rc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::routing::post;
use inlay_common::wire::SaveRequest;
use inlay_common::{ApiClient, EditorConfig};
use inlay_editor_core::{
    ChangeRegistry, EditorSession, History, ManualClock, MemoryElement, UndoManager,
};
use serde_json::json;
use url::Url;

async fn serve(app: Router) -> EditorConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    EditorConfig::for_site(Url::parse(&format!("http://{addr}")).unwrap()).unwrap()
}

fn session() -> EditorSession {
    EditorSession::new(
        ChangeRegistry::new(),
        History::new(Rc::new(ManualClock::new())),
    )
}

#[tokio::test]
async fn test_save_clears_accepted_and_keeps_rejected() {
    let app = Router::new().route(
        "/_cms/update",
        post(|Json(body): Json<SaveRequest>| async move {
            let rejected: Vec<_> = body
                .changes
                .iter()
                .filter(|c| c.cms_id == "seo-title")
                .map(|c| json!({ "cmsId": c.cms_id, "error": "no <title> in layout" }))
                .collect();
            Json(json!({
                "updated": body.changes.len() - rejected.len(),
                "errors": rejected,
            }))
        }),
    );
    let client = ApiClient::new(&serve(app).await);

    let mut session = session();
    let heading = MemoryElement::with_text("h1", "Hello").into_ref();
    let title = MemoryElement::new("title").into_ref();
    session.edit_text("cms-1", &heading, "Hi");
    session.edit_seo("seo-title", &title, "Home | Site");

    let outcome = session.save(&client, None, "/").await;
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].cms_id, "seo-title");

    assert!(session.registry().text.get("cms-1").is_none());
    assert!(session.registry().seo.get("seo-title").unwrap().dirty);
    // saving does not forget history
    assert_eq!(session.history().undo_len(), 2);
    assert!(session.can_undo());
}

#[tokio::test]
async fn test_save_failure_leaves_everything_dirty() {
    let app = Router::new().route(
        "/_cms/update",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "updated": 0 }))
        }),
    );
    let mut config = serve(app).await;
    config.request_timeout = Duration::from_millis(50);
    let client = ApiClient::new(&config);

    let mut session = session();
    let meta = MemoryElement::new("meta").into_ref();
    session.edit_seo("seo-description", &meta, "About us");
    session.edit_seo("seo-keywords", &meta, "cms");

    let outcome = session.save(&client, None, "/about").await;
    assert_eq!(outcome.updated, 0);
    let failed: Vec<&str> = outcome.errors.iter().map(|e| e.cms_id.as_str()).collect();
    assert_eq!(failed, vec!["seo-description", "seo-keywords"]);
    assert_eq!(session.total_dirty_count(), 2);
}

#[tokio::test]
async fn test_undo_after_save_recreates_entry() {
    let app = Router::new().route(
        "/_cms/update",
        post(|Json(body): Json<SaveRequest>| async move {
            Json(json!({ "updated": body.changes.len() }))
        }),
    );
    let client = ApiClient::new(&serve(app).await);

    let mut session = session();
    let heading = MemoryElement::with_text("h1", "Hello").into_ref();
    session.edit_text("cms-1", &heading, "Hi");
    session.save(&client, None, "/").await;
    assert_eq!(session.total_dirty_count(), 0);

    assert!(session.undo());
    let entry = session.registry().text.get("cms-1").unwrap();
    assert_eq!(entry.original.html, "Hi");
    assert_eq!(entry.current.html, "Hello");
    assert!(entry.dirty);
}
