//! Stream Frame Module
//!
//! One JSON object per line of a streamed response.

use serde::{Deserialize, Serialize};

/// Code marking successful completion of a stream.
pub const SUCCESS_CODE: i64 = 20_000_000;

// == Stream Frame ==
/// A single decoded line of a streamed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFrame {
    #[serde(default)]
    pub code: Option<i64>,
    /// Base64 payload chunk
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Usage accounting, sent alongside the completion frame
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

/// How the reassembler should treat a frame.
#[derive(Debug, PartialEq)]
pub enum FrameKind<'a> {
    /// Code 0 with a non-empty payload
    Chunk(&'a str),
    Complete,
    /// Any other positive code
    Error { code: i64, message: &'a str },
    /// Anything else (negative codes, code 0 without data, no code)
    Ignored,
}

impl StreamFrame {
    // == Classification ==
    pub fn kind(&self) -> FrameKind<'_> {
        match (self.code, self.data.as_deref()) {
            (Some(SUCCESS_CODE), _) => FrameKind::Complete,
            (Some(0), Some(data)) if !data.is_empty() => FrameKind::Chunk(data),
            (Some(code), _) if code > 0 => FrameKind::Error {
                code,
                message: self.message.as_deref().unwrap_or_default(),
            },
            _ => FrameKind::Ignored,
        }
    }
}
