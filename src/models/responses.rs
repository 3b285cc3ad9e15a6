//! Response DTOs for the galgame server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for POST /api/save
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub file_name: String,
    pub file_path: String,
}

impl SaveResponse {
    pub fn new(file_name: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            success: true,
            file_name: file_name.into(),
            file_path: file_path.into(),
        }
    }
}

/// One entry of the save listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSummary {
    pub file_name: String,
    pub modified_time: DateTime<Utc>,
    /// File size in bytes
    pub size: u64,
}

/// Response body for GET /api/saves, newest first
#[derive(Debug, Clone, Serialize)]
pub struct SaveListResponse {
    pub saves: Vec<SaveSummary>,
}

/// Response body for GET /api/save/:fileName
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    pub save_data: serde_json::Value,
    pub file_name: String,
}

/// Response body for GET /api/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub config: HealthConfig,
}

/// Non-secret view of the speech synthesis configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfig {
    pub app_id: String,
    pub resource_id: String,
    pub has_access_key: bool,
}

impl HealthResponse {
    pub fn ok(config: HealthConfig) -> Self {
        Self {
            status: "ok".to_string(),
            message: "TTS Proxy Server is running".to_string(),
            config,
        }
    }
}

/// Response body for GET /api/cache/stats
///
/// Reports what the server's store holds. Lookup counters stay with the
/// game session that performs the lookups and are not included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub character_images: usize,
    pub background_images: usize,
    pub total_cached: usize,
    /// Entries removed by background maintenance since startup
    pub evictions: u64,
    /// Bytes currently used in the backing store
    pub used_bytes: usize,
    pub quota_bytes: usize,
}

impl StatsResponse {
    pub fn new(stats: &CacheStats, used_bytes: usize, quota_bytes: usize) -> Self {
        Self {
            character_images: stats.character_images,
            background_images: stats.background_images,
            total_cached: stats.total_cached,
            evictions: stats.evictions,
            used_bytes,
            quota_bytes,
        }
    }
}
