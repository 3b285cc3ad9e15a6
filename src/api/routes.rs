//! API Routes
//!
//! Configures the Axum router with all galgame server endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, health_handler, list_saves_handler, load_save_handler, save_handler,
    tts_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `POST /api/save` - Write a save file
/// - `GET /api/saves` - List save files, newest first
/// - `GET /api/save/:fileName` - Read a save file
/// - `GET /api/health` - Health check with TTS configuration summary
/// - `POST /api/tts` - Forward a synthesis request to the TTS backend
/// - `GET /api/cache/stats` - Image cache statistics
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/save", post(save_handler))
        .route("/api/saves", get(list_saves_handler))
        .route("/api/save/:fileName", get(load_save_handler))
        .route("/api/health", get(health_handler))
        .route("/api/tts", post(tts_handler))
        .route("/api/cache/stats", get(cache_stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ImageCache, LocalStore};
    use crate::config::Config;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app(dir: &std::path::Path) -> Router {
        let config = Config {
            save_dir: dir.to_path_buf(),
            tts_api_url: "http://127.0.0.1:9/tts".to_string(),
            ..Config::default()
        };
        let cache = ImageCache::open(LocalStore::in_memory(1024 * 1024));
        create_router(AppState::from_config(&config, cache))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["config"]["hasAccessKey"], false);
    }

    #[tokio::test]
    async fn test_cache_stats_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/cache/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["totalCached"], 0);
    }

    #[tokio::test]
    async fn test_save_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/save")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"saveData":{"saveName":"测试"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert!(json["fileName"].as_str().unwrap().ends_with(".json"));
    }

    #[tokio::test]
    async fn test_load_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/save/nonexistent.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "存档不存在");
    }

    #[tokio::test]
    async fn test_tts_endpoint_unreachable_backend() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tts")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"req_params":{"text":"你好"}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "TTS代理服务器错误");
    }
}
