//! TTS Proxy
//!
//! Forwards synthesis requests to the backend with the configured
//! credentials and streams the backend's answer straight back.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::HealthConfig;

const PROXY_FAILURE: &str = "TTS代理服务器错误";

// == TTS Proxy ==
/// Credentialed forwarder to the synthesis backend.
#[derive(Debug, Clone)]
pub struct TtsProxy {
    http: reqwest::Client,
    api_url: String,
    app_id: String,
    access_key: String,
    resource_id: String,
}

impl TtsProxy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.tts_api_url.clone(),
            app_id: config.tts_app_id.clone(),
            access_key: config.tts_access_key.clone(),
            resource_id: config.tts_resource_id.clone(),
        }
    }

    /// Credentials summary for the health endpoint. The key itself is never exposed.
    pub fn health_config(&self) -> HealthConfig {
        HealthConfig {
            app_id: self.app_id.clone(),
            resource_id: self.resource_id.clone(),
            has_access_key: !self.access_key.is_empty(),
        }
    }

    // == Forward ==
    /// Sends `body` to the backend.
    ///
    /// A success status is relayed as a streamed `application/json` body,
    /// chunk by chunk. Any other status becomes [`AppError::Upstream`] with
    /// the backend's response text as details.
    pub async fn forward(&self, body: Value) -> Result<Response> {
        let request_id = Uuid::new_v4().to_string();
        info!("Forwarding TTS request {}", request_id);
        debug!("TTS request body: {}", body);

        let upstream = self
            .http
            .post(&self.api_url)
            .header("X-Api-App-Id", &self.app_id)
            .header("X-Api-Access-Key", &self.access_key)
            .header("X-Api-Resource-Id", &self.resource_id)
            .header("X-Api-Request-Id", &request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("TTS proxy transport error: {}", e);
                AppError::Failed {
                    context: PROXY_FAILURE.to_string(),
                    details: e.to_string(),
                }
            })?;

        let status = upstream.status();
        if !status.is_success() {
            let details = upstream.text().await.unwrap_or_default();
            error!("TTS API error {}: {}", status, details);
            return Err(AppError::Upstream {
                status: status.as_u16(),
                details,
            });
        }

        debug!("TTS request {} accepted, streaming response", request_id);
        Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            Body::from_stream(upstream.bytes_stream()),
        )
            .into_response())
    }
}
