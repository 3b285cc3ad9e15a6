//! API Handlers
//!
//! HTTP request handlers for the save-file, speech synthesis and cache
//! endpoints.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::ImageCache;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{
    HealthResponse, LoadResponse, SaveListResponse, SaveRequest, SaveResponse, StatsResponse,
};
use crate::saves::SaveDirectory;
use crate::tts::TtsProxy;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Save-file directory
    pub saves: SaveDirectory,
    /// Credentialed TTS forwarder
    pub tts: TtsProxy,
    /// Image cache, shared with the maintenance task
    pub cache: Arc<RwLock<ImageCache>>,
}

impl AppState {
    pub fn new(saves: SaveDirectory, tts: TtsProxy, cache: ImageCache) -> Self {
        Self {
            saves,
            tts,
            cache: Arc::new(RwLock::new(cache)),
        }
    }

    /// Creates the state from configuration around an opened cache.
    pub fn from_config(config: &Config, cache: ImageCache) -> Self {
        Self::new(
            SaveDirectory::new(config.save_dir.clone()),
            TtsProxy::from_config(config),
            cache,
        )
    }
}

/// Handler for POST /api/save
///
/// Writes `saveData` to its `fileName`, or to a timestamped file.
pub async fn save_handler(
    State(state): State<AppState>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<SaveResponse>> {
    let save_data = req
        .save_data
        .ok_or_else(|| AppError::InvalidRequest("缺少存档数据".to_string()))?;

    let written = state.saves.write(&save_data).await?;
    info!("Game saved: {}", written.file_name);

    Ok(Json(SaveResponse::new(
        written.file_name,
        written.file_path.display().to_string(),
    )))
}

/// Handler for GET /api/saves
pub async fn list_saves_handler(State(state): State<AppState>) -> Result<Json<SaveListResponse>> {
    let saves = state.saves.list().await?;
    Ok(Json(SaveListResponse { saves }))
}

/// Handler for GET /api/save/:fileName
pub async fn load_save_handler(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Json<LoadResponse>> {
    let save_data = state.saves.read(&file_name).await?;
    info!("Game loaded: {}", file_name);
    Ok(Json(LoadResponse {
        save_data,
        file_name,
    }))
}

/// Handler for GET /api/health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.tts.health_config()))
}

/// Handler for POST /api/tts
///
/// The backend's streamed answer is relayed as it arrives.
pub async fn tts_handler(State(state): State<AppState>, Json(body): Json<Value>) -> Result<Response> {
    state.tts.forward(body).await
}

/// Handler for GET /api/cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    let stats = cache.stats();
    let store = cache.store();
    Json(StatsResponse::new(&stats, store.used_bytes(), store.quota_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalStore;
    use serde_json::json;

    fn test_state(dir: &std::path::Path) -> AppState {
        let config = Config {
            save_dir: dir.to_path_buf(),
            ..Config::default()
        };
        AppState::from_config(&config, ImageCache::open(LocalStore::in_memory(1024 * 1024)))
    }

    #[tokio::test]
    async fn test_save_and_load_handler() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let req = SaveRequest {
            save_data: Some(json!({"fileName": "slot1.json", "saveName": "第一章"})),
        };
        let Json(saved) = save_handler(State(state.clone()), Json(req)).await.unwrap();
        assert!(saved.success);
        assert_eq!(saved.file_name, "slot1.json");

        let Json(loaded) = load_save_handler(State(state), Path("slot1.json".to_string()))
            .await
            .unwrap();
        assert_eq!(loaded.save_data["saveName"], "第一章");
    }

    #[tokio::test]
    async fn test_save_handler_requires_data() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_handler(State(test_state(dir.path())), Json(SaveRequest { save_data: None })).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(m)) if m == "缺少存档数据"));
    }

    #[tokio::test]
    async fn test_load_missing_save() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            load_save_handler(State(test_state(dir.path())), Path("nope.json".to_string())).await;
        assert!(matches!(result, Err(AppError::NotFound(m)) if m == "存档不存在"));
    }

    #[tokio::test]
    async fn test_cache_stats_handler() {
        let dir = tempfile::tempdir().unwrap();
        let Json(stats) = cache_stats_handler(State(test_state(dir.path()))).await;
        assert_eq!(stats.total_cached, 0);
        assert_eq!(stats.quota_bytes, 1024 * 1024);
        assert!(stats.used_bytes > 0);
    }
}
