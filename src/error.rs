//! Error types for the galgame server
//!
//! Provides unified error handling using thiserror.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == App Error Enum ==
/// Unified error type for the galgame server and its session components.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Malformed request data; the message is returned verbatim
    #[error("{0}")]
    InvalidRequest(String),

    /// One or more form fields violate their constraints, keyed by field name
    #[error("Validation failed: {}", format_fields(.0))]
    Validation(BTreeMap<String, String>),

    /// The key-value store refused a write because it is full
    #[error("Storage quota exceeded: {0}")]
    StorageQuota(String),

    /// Chat, image or TTS backend could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// A streamed frame or JSON document had an unexpected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The synthesis/generation backend returned an explicit error code
    #[error("Synthesis failed: {code} - {message}")]
    Synthesis { code: i64, message: String },

    /// A stream ended without delivering any payload chunk
    #[error("No data produced")]
    NoDataProduced,

    /// A previous request is still being processed
    #[error("Busy: {0}")]
    Busy(String),

    /// Upstream service answered with a non-success status
    #[error("Upstream error: {status} - {details}")]
    Upstream { status: u16, details: String },

    /// A server-side operation failed; rendered as `{"error": context, "details": ..}`
    #[error("{context}: {details}")]
    Failed { context: String, details: String },

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_fields(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, msg)| format!("{}: {}", field, msg))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::StorageQuota(_) => StatusCode::INSUFFICIENT_STORAGE,
            AppError::Network(_) => StatusCode::BAD_GATEWAY,
            AppError::MalformedResponse(_)
            | AppError::Synthesis { .. }
            | AppError::NoDataProduced => StatusCode::BAD_GATEWAY,
            AppError::Busy(_) => StatusCode::CONFLICT,
            AppError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Failed { .. } | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match self {
            AppError::NotFound(msg) | AppError::InvalidRequest(msg) => json!({ "error": msg }),
            AppError::Failed { context, details } => json!({
                "error": context,
                "details": details
            }),
            AppError::Upstream { status, details } => json!({
                "error": format!("TTS API请求失败: {}", status),
                "details": details
            }),
            AppError::Validation(fields) => json!({
                "error": "Validation failed",
                "fields": fields
            }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the galgame server.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_keeps_message_verbatim() {
        let (status, json) = body_json(AppError::NotFound("存档不存在".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "存档不存在");
    }

    #[tokio::test]
    async fn test_upstream_error_mirrors_status() {
        let err = AppError::Upstream {
            status: 401,
            details: "bad key".to_string(),
        };
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "TTS API请求失败: 401");
        assert_eq!(json["details"], "bad key");
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("nickname".to_string(), "请输入昵称".to_string());
        let (status, json) = body_json(AppError::Validation(fields)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["fields"]["nickname"], "请输入昵称");
    }

    #[tokio::test]
    async fn test_failed_operation_carries_details() {
        let err = AppError::Failed {
            context: "保存失败".to_string(),
            details: "disk full".to_string(),
        };
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "保存失败");
        assert_eq!(json["details"], "disk full");
    }

    #[test]
    fn test_synthesis_message_contains_backend_text() {
        let err = AppError::Synthesis {
            code: 55000001,
            message: "quota exceeded".to_string(),
        };
        assert!(err.to_string().contains("quota exceeded"));
        assert!(err.to_string().contains("55000001"));
    }

    #[test]
    fn test_status_codes() {
        let cases = vec![
            (AppError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Busy("x".into()), StatusCode::CONFLICT),
            (AppError::NoDataProduced, StatusCode::BAD_GATEWAY),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
