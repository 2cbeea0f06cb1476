//! Integration tests for the site CMS backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use reqwest::Client;
use tower::ServiceExt;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, RemoteGating};
use crate::{create_router, AppState};

const ADMIN_KEY: &str = "test-admin-key";

/// Test fixture for integration tests.
struct TestFixture {
    /// Sends the admin key on every request
    client: Client,
    anonymous: Client,
    base_url: String,
    _temp_dir: TempDir,
}

fn test_config(dir: &Path, admin_key: Option<String>) -> Config {
    Config {
        admin_key,
        admin_email: "admin@example.com".to_string(),
        admin_name: "Admin".to_string(),
        db_path: dir.join("test.sqlite"),
        cache_dir: dir.join("cache"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".to_string(),
        gating: RemoteGating::StrictAdmin,
        load_timeout: Duration::from_secs(5),
        save_timeout: Duration::from_secs(5),
        autosave_delay: Duration::from_millis(100),
        editor_idle_timeout: Duration::from_secs(60),
        realtime_defer: Duration::from_millis(10),
        probe_interval: Duration::from_secs(60),
    }
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = test_config(temp_dir.path(), Some(ADMIN_KEY.to_string()));
        Self::with_config(temp_dir, config).await
    }

    async fn with_config(temp_dir: TempDir, config: Config) -> Self {
        let state = AppState::build(Arc::new(config))
            .await
            .expect("Failed to build state");

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", ADMIN_KEY.parse().unwrap());

        TestFixture {
            client: Client::builder().default_headers(headers).build().unwrap(),
            anonymous: Client::new(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn content(&self) -> Value {
        let resp = self
            .anonymous
            .get(self.url("/api/content"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["content"].clone()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_router_serves_requests_in_process() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), Some(ADMIN_KEY.to_string()));
    let state = AppState::build(Arc::new(config)).await.unwrap();
    let app = create_router(state);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/content/save")
                .header("x-api-key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/content/save")
                .header("cookie", "cms_session=\"test-admin-key\"")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["data"]["outcome"], "persisted");
}

#[tokio::test]
async fn test_public_content_serves_defaults() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/content"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["isLoading"], false);
    assert_eq!(
        body["data"]["content"]["header"]["logoText"],
        "Northlight Digital"
    );
    assert!(body["revisionId"].is_number());
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/content"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_anonymous_edit_is_refused() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .patch(fixture.url("/api/admin/content"))
        .json(&json!({ "hero": { "title": "Defaced" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    assert_ne!(fixture.content().await["hero"]["title"], "Defaced");
}

#[tokio::test]
async fn test_admin_patch_persists() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .patch(fixture.url("/api/admin/content"))
        .json(&json!({ "contact": { "email": "hello@northlight.test" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["outcome"], "persisted");
    assert!(body["data"]["revision"].as_i64().unwrap() >= 1);
    assert_eq!(body["revisionId"], body["data"]["revision"]);

    let content = fixture.content().await;
    assert_eq!(content["contact"]["email"], "hello@northlight.test");
    // Untouched sections keep their defaults.
    assert_eq!(content["header"]["logoText"], "Northlight Digital");
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/admin/content/save"))
        .header("cookie", format!("cms_session={}", ADMIN_KEY))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["outcome"], "persisted");
}

#[tokio::test]
async fn test_section_update() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/content/sections/footer"))
        .json(&json!({ "copyright": "2026 Northlight" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let content = fixture.content().await;
    assert_eq!(content["footer"]["copyright"], "2026 Northlight");

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/content/sections/sidebar"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_nested_path_update() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/content/paths/hero.stats.0.value"))
        .json(&json!("250+"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/content/paths/promo.banner.text"))
        .json(&json!("Spring sale"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let content = fixture.content().await;
    assert_eq!(content["hero"]["stats"][0]["value"], "250+");
    assert_eq!(content["promo"]["banner"]["text"], "Spring sale");

    let resp = fixture
        .client
        .put(fixture.url("/api/admin/content/paths/hero..title"))
        .json(&json!("x"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_reset_restores_defaults() {
    let fixture = TestFixture::new().await;

    fixture
        .client
        .patch(fixture.url("/api/admin/content"))
        .json(&json!({ "hero": { "title": "Temporary" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(fixture.content().await["hero"]["title"], "Temporary");

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/content/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/content/load"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["data"]["content"]["hero"]["title"],
        "We build websites that work as hard as you do"
    );
    assert!(body["data"]["loadError"].is_null());
}

#[tokio::test]
async fn test_status_after_save() {
    let fixture = TestFixture::new().await;

    fixture
        .client
        .post(fixture.url("/api/admin/content/save"))
        .send()
        .await
        .unwrap();

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/status"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["sync"]["state"], "saved");
    assert_eq!(body["data"]["network"]["isOnline"], true);
    assert_eq!(body["data"]["realtime"], false);
}

#[tokio::test]
async fn test_replay_with_nothing_pending() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/content/replay"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["replayed"], false);

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/admin/content/replay"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_content_stream_sends_snapshot() {
    let fixture = TestFixture::new().await;

    let mut resp = fixture
        .client
        .get(fixture.url("/api/admin/content/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let mut text = String::new();
    while !text.contains("Northlight Digital") {
        let chunk = resp.chunk().await.unwrap().expect("stream ended early");
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(text.starts_with("event: content"));
    assert!(text.contains("Northlight Digital"));

    let status: Value = fixture
        .client
        .get(fixture.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["data"]["realtime"], true);

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/admin/content/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_editor_create_then_update() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/editors"))
        .json(&json!({ "collection": "blog", "data": { "title": "Draft" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["hasUnsavedChanges"], false);
    assert!(body["data"]["data"]["id"].is_null());

    let resp = fixture
        .client
        .patch(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .json(&json!({ "title": "First post" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["shouldConfirmLeave"], true);

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/admin/editors/{}/save", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let record_id = body["data"]["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["hasUnsavedChanges"], false);
    assert!(body["data"]["lastSaved"].is_string());

    fixture
        .client
        .patch(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .json(&json!({ "title": "First post, revised" }))
        .send()
        .await
        .unwrap();
    fixture
        .client
        .post(fixture.url(&format!("/api/admin/editors/{}/save", session_id)))
        .send()
        .await
        .unwrap();

    let resp = fixture
        .anonymous
        .get(fixture.url(&format!("/api/records/blog/{}", record_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["data"]["title"], "First post, revised");
    assert_eq!(body["data"]["version"], 2);
    assert_eq!(body["data"]["updatedBy"], "admin@example.com");

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/records/blog"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_editor_auto_saves_after_quiet_period() {
    let fixture = TestFixture::new().await;

    let body: Value = fixture
        .client
        .post(fixture.url("/api/admin/editors"))
        .json(&json!({ "collection": "products" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    fixture
        .client
        .patch(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .json(&json!({ "name": "Widget" }))
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["hasUnsavedChanges"], false);
    assert!(body["data"]["data"]["id"].is_string());

    let body: Value = fixture
        .anonymous
        .get(fixture.url("/api/records/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"][0]["data"]["name"], "Widget");
}

#[tokio::test]
async fn test_editor_close_reports_discarded_changes() {
    let fixture = TestFixture::new().await;

    let body: Value = fixture
        .client
        .post(fixture.url("/api/admin/editors"))
        .json(&json!({ "collection": "team" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

    fixture
        .client
        .patch(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["closed"], true);
    assert_eq!(body["data"]["discardedChanges"], true);

    // The pending auto-save died with the editor.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let body: Value = fixture
        .anonymous
        .get(fixture.url("/api/records/team"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/admin/editors/{}", session_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_unknown_collection() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/admin/editors"))
        .json(&json!({ "collection": "recipes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .anonymous
        .get(fixture.url("/api/records/recipes"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_without_admin_key_editing_is_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), None);
    let fixture = TestFixture::with_config(temp_dir, config).await;

    // Any presented key is unknown when none is configured.
    let resp = fixture
        .client
        .post(fixture.url("/api/admin/content/save"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture
        .anonymous
        .post(fixture.url("/api/admin/content/save"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    assert_eq!(
        fixture.content().await["header"]["logoText"],
        "Northlight Digital"
    );
}
