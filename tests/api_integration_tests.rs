//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against a temporary
//! save directory and an in-memory store.

use std::path::Path;
use std::time::{Duration, SystemTime};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use galgame_server::{create_router, AppState, Config, ImageCache, LocalStore};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

fn test_config(save_dir: &Path, tts_url: &str) -> Config {
    Config {
        save_dir: save_dir.to_path_buf(),
        tts_api_url: tts_url.to_string(),
        tts_app_id: "app-42".to_string(),
        ..Config::default()
    }
}

fn create_test_app_with(dir: &TempDir, tts_url: &str) -> Router {
    let config = test_config(dir.path(), tts_url);
    let cache = ImageCache::open(LocalStore::in_memory(1024 * 1024));
    create_router(AppState::from_config(&config, cache))
}

fn create_test_app(dir: &TempDir) -> Router {
    create_test_app_with(dir, "http://127.0.0.1:9/tts")
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_json(app: Router, uri: &str, body: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// `YYYY-MM-DD_HH-MM-SS.json`
fn is_timestamp_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".json") else {
        return false;
    };
    let bytes = stem.as_bytes();
    bytes.len() == 19
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 | 13 | 16 => *b == b'-',
            10 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// Local stand-in for the synthesis backend answering with a fixed status.
async fn spawn_tts_backend(status: StatusCode, body: &'static str) -> String {
    let app = Router::new().route("/tts", post(move || async move { (status, body) }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/tts", addr)
}

// == Save Endpoint Tests ==

#[tokio::test]
async fn test_save_without_file_name_uses_timestamp() {
    let dir = TempDir::new().unwrap();
    let app = create_test_app(&dir);

    let response = post_json(app, "/api/save", r#"{"saveData":{"saveName":"第一章"}}"#).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["success"], true);
    let file_name = json["fileName"].as_str().unwrap();
    assert!(is_timestamp_file_name(file_name), "unexpected name {}", file_name);
    assert!(dir.path().join(file_name).exists());
    assert!(json["filePath"].as_str().unwrap().ends_with(file_name));
}

#[tokio::test]
async fn test_save_is_pretty_printed_and_overwrites() {
    let dir = TempDir::new().unwrap();

    for chapter in ["一", "二"] {
        let body = format!(r#"{{"saveData":{{"fileName":"slot.json","chapter":"{}"}}}}"#, chapter);
        let response = post_json(create_test_app(&dir), "/api/save", &body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let raw = std::fs::read_to_string(dir.path().join("slot.json")).unwrap();
    assert!(raw.contains('\n'));
    let saved: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(saved["chapter"], "二");
}

#[tokio::test]
async fn test_save_missing_data() {
    let dir = TempDir::new().unwrap();
    let response = post_json(create_test_app(&dir), "/api/save", "{}").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "缺少存档数据");
}

#[tokio::test]
async fn test_save_rejects_path_traversal() {
    let dir = TempDir::new().unwrap();
    let response = post_json(
        create_test_app(&dir),
        "/api/save",
        r#"{"saveData":{"fileName":"../escape.json"}}"#,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!dir.path().parent().unwrap().join("escape.json").exists());
}

// == List Endpoint Tests ==

#[tokio::test]
async fn test_list_saves_newest_first() {
    let dir = TempDir::new().unwrap();
    for name in ["old.json", "new.json"] {
        let body = format!(r#"{{"saveData":{{"fileName":"{}"}}}}"#, name);
        post_json(create_test_app(&dir), "/api/save", &body).await;
    }
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let old = std::fs::File::options()
        .write(true)
        .open(dir.path().join("old.json"))
        .unwrap();
    old.set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();

    let response = get(create_test_app(&dir), "/api/saves").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    let saves = json["saves"].as_array().unwrap();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[0]["fileName"], "new.json");
    assert_eq!(saves[1]["fileName"], "old.json");
    assert!(saves[0]["size"].as_u64().unwrap() > 0);
    assert!(saves[0]["modifiedTime"].is_string());
}

#[tokio::test]
async fn test_list_saves_missing_directory() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("not_created"), "http://127.0.0.1:9/tts");
    let cache = ImageCache::open(LocalStore::in_memory(1024 * 1024));
    let app = create_router(AppState::from_config(&config, cache));

    let response = get(app, "/api/saves").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["saves"], serde_json::json!([]));
}

// == Load Endpoint Tests ==

#[tokio::test]
async fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    post_json(
        create_test_app(&dir),
        "/api/save",
        r#"{"saveData":{"fileName":"hero.json","gameData":{"aiProfile":{"nickname":"小雪"}}}}"#,
    )
    .await;

    let response = get(create_test_app(&dir), "/api/save/hero.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["fileName"], "hero.json");
    assert_eq!(json["saveData"]["gameData"]["aiProfile"]["nickname"], "小雪");
}

#[tokio::test]
async fn test_load_not_found() {
    let dir = TempDir::new().unwrap();
    let response = get(create_test_app(&dir), "/api/save/missing.json").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "存档不存在");
}

#[tokio::test]
async fn test_load_rejects_encoded_traversal() {
    let dir = TempDir::new().unwrap();
    let response = get(create_test_app(&dir), "/api/save/..%2Fsecret.json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let response = get(create_test_app(&dir), "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "TTS Proxy Server is running");
    assert_eq!(json["config"]["appId"], "app-42");
    assert_eq!(json["config"]["resourceId"], "seed-tts-1.0");
    assert_eq!(json["config"]["hasAccessKey"], false);
}

// == TTS Proxy Tests ==

#[tokio::test]
async fn test_tts_streams_backend_body() {
    let frames = "{\"code\":0,\"data\":\"QUJD\"}\n{\"code\":20000000}\n";
    let url = spawn_tts_backend(StatusCode::OK, frames).await;
    let dir = TempDir::new().unwrap();

    let response = post_json(create_test_app_with(&dir, &url), "/api/tts", "{}").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes, frames.as_bytes());
}

#[tokio::test]
async fn test_tts_mirrors_backend_error_status() {
    let url = spawn_tts_backend(StatusCode::FORBIDDEN, "access denied").await;
    let dir = TempDir::new().unwrap();

    let response = post_json(create_test_app_with(&dir, &url), "/api/tts", "{}").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "TTS API请求失败: 403");
    assert_eq!(json["details"], "access denied");
}

#[tokio::test]
async fn test_tts_unreachable_backend() {
    let dir = TempDir::new().unwrap();
    let response = post_json(create_test_app(&dir), "/api/tts", "{}").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "TTS代理服务器错误");
    assert!(json["details"].is_string());
}

// == Cache Stats Tests ==

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let dir = TempDir::new().unwrap();
    let response = get(create_test_app(&dir), "/api/cache/stats").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["characterImages"], 0);
    assert_eq!(json["backgroundImages"], 0);
    assert_eq!(json["evictions"], 0);
    assert_eq!(json["quotaBytes"], 1024 * 1024);
    assert!(json.get("hitRate").is_none());
    assert!(json.get("hits").is_none());
}
