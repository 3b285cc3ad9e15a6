//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Directory holding save-file documents
    pub save_dir: PathBuf,
    /// Third-party TTS application id
    pub tts_app_id: String,
    /// Third-party TTS access key
    pub tts_access_key: String,
    /// Third-party TTS resource id
    pub tts_resource_id: String,
    /// Third-party TTS endpoint the proxy forwards to
    pub tts_api_url: String,
    /// Backing file of the local key-value store
    pub store_path: PathBuf,
    /// Byte quota of the local key-value store
    pub store_quota_bytes: usize,
    /// Maximum age in seconds of cached images kept by maintenance
    pub cache_max_age: u64,
    /// Background cache maintenance interval in seconds
    pub cache_maintenance_interval: u64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3001)
    /// - `SAVE_DIR` - Save-file directory (default: saved_games)
    /// - `TTS_APP_ID` / `TTS_ACCESS_KEY` - TTS credentials (default: empty)
    /// - `TTS_RESOURCE_ID` - TTS resource (default: seed-tts-1.0)
    /// - `TTS_API_URL` - Upstream TTS endpoint
    /// - `STORE_PATH` - Key-value store file (default: galgame_store.json)
    /// - `STORE_QUOTA_BYTES` - Store quota (default: 5 MiB)
    /// - `CACHE_MAX_AGE_SECS` - Image cache retention (default: 7 days)
    /// - `CACHE_MAINTENANCE_INTERVAL` - Maintenance frequency in seconds (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            save_dir: env_or("SAVE_DIR", defaults.save_dir),
            tts_app_id: env_or("TTS_APP_ID", defaults.tts_app_id),
            tts_access_key: env_or("TTS_ACCESS_KEY", defaults.tts_access_key),
            tts_resource_id: env_or("TTS_RESOURCE_ID", defaults.tts_resource_id),
            tts_api_url: env_or("TTS_API_URL", defaults.tts_api_url),
            store_path: env_or("STORE_PATH", defaults.store_path),
            store_quota_bytes: env_or("STORE_QUOTA_BYTES", defaults.store_quota_bytes),
            cache_max_age: env_or("CACHE_MAX_AGE_SECS", defaults.cache_max_age),
            cache_maintenance_interval: env_or(
                "CACHE_MAINTENANCE_INTERVAL",
                defaults.cache_maintenance_interval,
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3001,
            save_dir: PathBuf::from("saved_games"),
            tts_app_id: String::new(),
            tts_access_key: String::new(),
            tts_resource_id: "seed-tts-1.0".to_string(),
            tts_api_url: "https://openspeech.bytedance.com/api/v3/tts/unidirectional".to_string(),
            store_path: PathBuf::from("galgame_store.json"),
            store_quota_bytes: 5 * 1024 * 1024,
            cache_max_age: 7 * 24 * 60 * 60,
            cache_maintenance_interval: 3600,
        }
    }
}
