//! Request DTOs for the galgame server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::{Deserialize, Serialize};

/// Request body for POST /api/save
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// The save document; may carry a `fileName` to overwrite a specific save
    #[serde(default)]
    pub save_data: Option<serde_json::Value>,
}

// == Speech Synthesis Request ==
/// Body of POST /api/tts, forwarded verbatim to the synthesis backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequest {
    pub user: TtsUser,
    pub req_params: TtsRequestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsUser {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsRequestParams {
    pub text: String,
    /// Voice identifier
    pub speaker: String,
    pub audio_params: AudioParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub format: String,
    pub sample_rate: u32,
    /// Relative speed in `[-50, 100]`
    pub speech_rate: i32,
    /// Relative loudness in `[-50, 100]`
    pub loudness_rate: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    /// Emotion intensity in `[1, 5]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_scale: Option<u8>,
}
