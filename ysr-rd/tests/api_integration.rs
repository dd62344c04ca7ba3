//! Integration tests for the reading desk HTTP API
//!
//! Drives the full route table in-process with tower's `oneshot`:
//! - Health and navigation
//! - Reader: article list, opening, segment playback, speed, word popup
//! - Admin: create, update, publish toggle, delete, editor state

mod helpers;

use axum::body::Body;
use axum::http::StatusCode;
use helpers::{article_draft, segment, wav_data_uri};
use http::{Method, Request};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use ysr_common::db::init_memory_database;
use ysr_common::events::View;
use ysr_common::store::{ArticleStore, LocalStore};
use ysr_rd::api::{build_router, AppContext};
use ysr_rd::audio::{DecodeAdapter, NullOutput};
use ysr_rd::SharedState;

struct TestApp {
    router: axum::Router,
    state: Arc<SharedState>,
    _media: TempDir,
}

/// Test helper to create the app over an in-memory local store
async fn setup_test_app() -> TestApp {
    let media = TempDir::new().unwrap();
    let store: Arc<dyn ArticleStore> =
        Arc::new(LocalStore::new(init_memory_database().await.unwrap()));

    let mut hidden = article_draft("hidden", "Work in progress");
    hidden.is_published = false;
    let mut broken = article_draft("broken", "Broken audio");
    broken.segments = vec![segment("s1", "This clip is damaged.", Some("%%%".to_string()))];
    store.save_article(broken).await.unwrap();
    store.save_article(hidden).await.unwrap();
    store.save_article(article_draft("a1", "Following up")).await.unwrap();

    let state = Arc::new(SharedState::new(
        store,
        Arc::new(DecodeAdapter::new(media.path().to_path_buf(), 8).unwrap()),
        Arc::new(NullOutput::default()),
        Duration::from_millis(50),
        View::Reader,
    ));
    state.router.load().await;

    let router = build_router(AppContext {
        state: Arc::clone(&state),
        port: 0,
    });

    TestApp {
        router,
        state,
        _media: media,
    }
}

/// Helper function to make HTTP requests to the test app
async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);

    let request = match body {
        Some(json_body) => {
            request = request.header("content-type", "application/json");
            request.body(Body::from(json_body.to_string())).unwrap()
        }
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, json)
}

async fn open_a1(app: &TestApp) -> Value {
    let (status, body) =
        make_request(&app.router, Method::POST, "/api/reader/articles/a1/open", None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn span_rect() -> Value {
    json!({ "top": 300.0, "left": 120.0, "width": 40.0, "height": 18.0 })
}

fn container_rect() -> Value {
    json!({ "top": 100.0, "left": 20.0, "width": 600.0, "height": 900.0 })
}

// ============================================================================
// Health and navigation
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_test_app().await;
    let (status, body) = make_request(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["module"], "ysr-rd");
    assert_eq!(body["store"], "local");
    assert_eq!(body["output"], "null");
}

#[tokio::test]
async fn test_view_resolution_and_navigation() {
    let app = setup_test_app().await;

    let (_, body) = make_request(&app.router, Method::GET, "/api/view?view=admin", None).await;
    assert_eq!(body["view"], "admin");
    assert_eq!(body["query"], "?view=admin");

    let (_, body) = make_request(&app.router, Method::GET, "/api/view", None).await;
    assert_eq!(body["view"], "reader");

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/navigate",
        Some(json!({ "view": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "admin");
    assert_eq!(body["query"], "?view=admin");

    let (_, body) = make_request(&app.router, Method::GET, "/api/view", None).await;
    assert_eq!(body["view"], "admin");

    let (_, body) = make_request(
        &app.router,
        Method::POST,
        "/api/popstate",
        Some(json!({ "query": "" })),
    )
    .await;
    assert_eq!(body["view"], "reader");
    assert_eq!(body["query"], "");
}

#[tokio::test]
async fn test_unknown_view_is_rejected() {
    let app = setup_test_app().await;
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/navigate",
        Some(json!({ "view": "settings" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Reader page
// ============================================================================

#[tokio::test]
async fn test_reader_lists_published_only() {
    let app = setup_test_app().await;
    let (status, body) = make_request(&app.router, Method::GET, "/api/reader/articles", None).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"a1"));
    assert!(ids.contains(&"broken"));
    assert!(!ids.contains(&"hidden"));
}

#[tokio::test]
async fn test_open_article_highlights_and_counts() {
    let app = setup_test_app().await;
    let body = open_a1(&app).await;

    assert_eq!(body["viewCount"], 1);
    let first = &body["segments"][0];
    assert_eq!(first["hasAudio"], true);
    assert_eq!(body["segments"][1]["hasAudio"], false);

    let fragments = first["fragments"].as_array().unwrap();
    let texts: String = fragments.iter().map(|f| f["text"].as_str().unwrap()).collect();
    assert_eq!(texts, "Please follow up with the team.");
    assert_eq!(fragments[1]["kind"], "vocabulary");
    assert_eq!(fragments[1]["text"], "follow up");
    assert_eq!(fragments[1]["vocabularyId"], "v1");

    let (status, body) = make_request(&app.router, Method::GET, "/api/reader/article", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "a1");
}

#[tokio::test]
async fn test_open_unpublished_is_not_found() {
    let app = setup_test_app().await;
    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/articles/hidden/open",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["status"].as_str().unwrap().starts_with("error"));
}

#[tokio::test]
async fn test_play_requires_open_article() {
    let app = setup_test_app().await;
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/segments/s1/play",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_segment_play_toggle_and_no_audio() {
    let app = setup_test_app().await;
    open_a1(&app).await;

    let (status, body) =
        make_request(&app.router, Method::POST, "/api/reader/segments/s2/play", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "no_audio");
    assert_eq!(body["channel"]["status"], "idle");

    let (_, body) =
        make_request(&app.router, Method::POST, "/api/reader/segments/s1/play", None).await;
    assert_eq!(body["outcome"], "started");
    assert_eq!(body["channel"]["status"], "playing");
    assert_eq!(body["channel"]["itemId"], "s1");

    let (_, body) =
        make_request(&app.router, Method::POST, "/api/reader/segments/s1/play", None).await;
    assert_eq!(body["outcome"], "stopped");
    assert_eq!(body["channel"]["status"], "idle");

    let (status, _) =
        make_request(&app.router, Method::POST, "/api/reader/segments/zz/play", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_decode_failure_is_unprocessable() {
    let app = setup_test_app().await;
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/articles/broken/open",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        make_request(&app.router, Method::POST, "/api/reader/segments/s1/play", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["status"].as_str().unwrap().contains("Decode"));

    let (_, body) = make_request(&app.router, Method::GET, "/api/reader/playback", None).await;
    assert_eq!(body["sentence"]["status"], "idle");
}

#[tokio::test]
async fn test_speed_selection() {
    let app = setup_test_app().await;

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/playback/speed",
        Some(json!({ "speed": 1.25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["speed"], 1.25);

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/playback/speed",
        Some(json!({ "speed": 3.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = make_request(&app.router, Method::GET, "/api/reader/playback", None).await;
    assert_eq!(body["sentence"]["speed"], 1.25);
    assert_eq!(body["word"]["speed"], 1.0, "word channel keeps normal speed");
}

#[tokio::test]
async fn test_word_popup_lifecycle() {
    let app = setup_test_app().await;
    open_a1(&app).await;

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/words/v1/activate",
        Some(json!({ "span": span_rect(), "container": container_rect() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["popup"]["vocabulary"]["id"], "v1");
    assert_eq!(body["popup"]["anchor"]["top"], 190.0);
    assert_eq!(body["popup"]["anchor"]["left"], 120.0);
    assert_eq!(body["playback"], "started");

    // Silent vocabulary replaces the popup without sound
    let (_, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/words/v2/activate",
        Some(json!({ "span": span_rect() })),
    )
    .await;
    assert_eq!(body["popup"]["vocabulary"]["id"], "v2");
    assert_eq!(body["popup"]["anchor"], Value::Null);
    assert_eq!(body["playback"], "no_audio");

    let (_, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/click",
        Some(json!({ "insidePopup": true })),
    )
    .await;
    assert_eq!(body["dismissed"], false);

    let (_, body) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/click",
        Some(json!({})),
    )
    .await;
    assert_eq!(body["dismissed"], true);

    let (_, body) = make_request(&app.router, Method::GET, "/api/reader/popup", None).await;
    assert_eq!(body, Value::Null);

    let (_, body) =
        make_request(&app.router, Method::POST, "/api/reader/popup/close", None).await;
    assert_eq!(body["dismissed"], false);
}

#[tokio::test]
async fn test_unknown_word_is_not_found() {
    let app = setup_test_app().await;
    open_a1(&app).await;
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/words/nope/activate",
        Some(json!({ "span": span_rect() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leaving_reader_stops_audio() {
    let app = setup_test_app().await;
    open_a1(&app).await;
    make_request(&app.router, Method::POST, "/api/reader/segments/s1/play", None).await;
    make_request(
        &app.router,
        Method::POST,
        "/api/reader/words/v1/activate",
        Some(json!({ "span": span_rect() })),
    )
    .await;

    let (_, body) = make_request(
        &app.router,
        Method::POST,
        "/api/navigate",
        Some(json!({ "view": "admin" })),
    )
    .await;
    assert_eq!(body["selectedArticleId"], Value::Null);

    let (_, body) = make_request(&app.router, Method::GET, "/api/reader/playback", None).await;
    assert_eq!(body["sentence"]["status"], "idle");
    assert_eq!(body["word"]["status"], "idle");
    assert!(app.state.popup.active().await.is_none());
}

#[tokio::test]
async fn test_close_article_returns_to_list() {
    let app = setup_test_app().await;
    open_a1(&app).await;

    let (_, body) = make_request(&app.router, Method::POST, "/api/reader/close", None).await;
    assert_eq!(body["closed"], "a1");

    let (status, _) = make_request(&app.router, Method::GET, "/api/reader/article", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Admin page
// ============================================================================

#[tokio::test]
async fn test_admin_create_update_delete() {
    let app = setup_test_app().await;

    let draft = json!({
        "id": "",
        "title": "New piece",
        "author": "Liu",
        "segments": [{ "id": "s1", "text": "Hello world." }],
        "tags": ["news"],
        "keyVocabulary": []
    });
    let (status, body) =
        make_request(&app.router, Method::POST, "/api/admin/articles", Some(draft)).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, body) = make_request(
        &app.router,
        Method::GET,
        &format!("/api/admin/articles/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isPublished"], true, "published by default");
    assert_eq!(body["viewCount"], 0);

    let update = json!({
        "id": "ignored",
        "title": "Renamed piece",
        "author": "Liu",
        "segments": [],
        "isPublished": true
    });
    let (status, body) = make_request(
        &app.router,
        Method::PUT,
        &format!("/api/admin/articles/{}", id),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (_, body) = make_request(
        &app.router,
        Method::GET,
        &format!("/api/admin/articles/{}", id),
        None,
    )
    .await;
    assert_eq!(body["title"], "Renamed piece");

    let (status, _) = make_request(
        &app.router,
        Method::DELETE,
        &format!("/api/admin/articles/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_request(
        &app.router,
        Method::GET,
        &format!("/api/admin/articles/{}", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_rejects_blank_title() {
    let app = setup_test_app().await;
    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/admin/articles",
        Some(json!({ "id": "", "title": " ", "author": "Liu" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_publish_toggle_hides_from_reader() {
    let app = setup_test_app().await;

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/admin/articles/a1/publish",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isPublished"], false);

    let (_, body) = make_request(&app.router, Method::GET, "/api/reader/articles", None).await;
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|a| a["id"] != "a1"));

    let (_, body) = make_request(&app.router, Method::GET, "/api/admin/articles", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/admin/articles/ghost/publish",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_editor_state() {
    let app = setup_test_app().await;

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/admin/editor",
        Some(json!({ "id": "a1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["id"], "a1");

    let snapshot = app.state.router.snapshot().await;
    assert!(snapshot.show_editor);
    assert_eq!(snapshot.editing_article_id.as_deref(), Some("a1"));

    let (_, body) = make_request(&app.router, Method::DELETE, "/api/admin/editor", None).await;
    assert_eq!(body["showEditor"], false);
    assert_eq!(body["editingArticleId"], Value::Null);

    let (_, body) = make_request(&app.router, Method::POST, "/api/admin/reload", None).await;
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_inline_clip_on_new_article_plays() {
    let app = setup_test_app().await;
    let draft = json!({
        "id": "fresh",
        "title": "Fresh clip",
        "author": "Liu",
        "segments": [{ "id": "x1", "text": "Short.", "audioData": wav_data_uri(1_000) }]
    });
    make_request(&app.router, Method::POST, "/api/admin/articles", Some(draft)).await;

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/reader/articles/fresh/open",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) =
        make_request(&app.router, Method::POST, "/api/reader/segments/x1/play", None).await;
    assert_eq!(body["outcome"], "started");
    assert_eq!(body["channel"]["durationMs"], 1000);

    app.state.shutdown().await;
}

#[tokio::test]
async fn test_event_stream_starts_with_snapshot() {
    let app = setup_test_app().await;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/events")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("snapshot frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: Snapshot"));
    assert!(text.contains("\"sentence\""));
}
