//! Chat and Image Capabilities
//!
//! Traits over the external chat and image generation services, plus the
//! normalization of generated image handles into a usable URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};

// == Chat ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Persona and sampling settings for a chat client.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPersona {
    pub system_prompt: String,
    pub temperature: f32,
    /// Number of past messages the client keeps as context
    pub max_history_length: usize,
}

/// A stateful conversation with the chat model.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn set_persona(&mut self, persona: ChatPersona);

    /// Appends a past message to the model's context without sending it.
    fn append_message(&mut self, role: ChatRole, content: &str);

    fn clear_history(&mut self);

    /// Sends `message`, calling `on_delta` for every streamed text fragment,
    /// and returns the full reply.
    async fn talk_stream(
        &mut self,
        message: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String>;
}

// == Image ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    /// `WIDTHxHEIGHT`
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Handle returned by the image service. Any one of the fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Fully formed `data:` URL
    pub data_url: Option<String>,
    /// Base64 image data, with or without a `data:` prefix
    pub base64: Option<String>,
    /// Remote URL
    pub url: Option<String>,
}

#[async_trait]
pub trait ImageClient: Send + Sync {
    async fn generate_image(&self, request: ImageRequest) -> Result<GeneratedImage>;
}

const PNG_PREFIX: &str = "data:image/png;base64,";

// == Extract Image URL ==
/// Resolves a generated image to a `data:` or `http(s)` URL.
///
/// Prefers `data_url`, then `base64`, then `url`, and repairs a doubled
/// `data:` prefix.
pub fn extract_image_url(image: &GeneratedImage) -> Result<String> {
    let mut url = if let Some(data_url) = &image.data_url {
        data_url.clone()
    } else if let Some(b64) = image.base64.as_deref().filter(|s| !s.is_empty()) {
        if b64.starts_with("data:") {
            b64.to_string()
        } else {
            format!("{}{}", PNG_PREFIX, b64)
        }
    } else if let Some(remote) = image.url.as_deref().filter(|s| !s.is_empty()) {
        remote.to_string()
    } else {
        return Err(AppError::MalformedResponse(
            "No valid image URL method found".to_string(),
        ));
    };

    let doubled = format!("{}{}", PNG_PREFIX, PNG_PREFIX);
    if let Some(rest) = url.strip_prefix(&doubled) {
        warn!("Repairing duplicated data URL prefix");
        url = format!("{}{}", PNG_PREFIX, rest);
    }
    url = strip_nested_data_prefix(url);

    if !url.starts_with("data:") && !url.starts_with("http") {
        let head: String = url.chars().take(100).collect();
        return Err(AppError::MalformedResponse(format!(
            "Invalid image URL format: {}",
            head
        )));
    }
    Ok(url)
}

/// `data:<meta>,data:...` becomes `data:...`.
fn strip_nested_data_prefix(url: String) -> String {
    if let Some(rest) = url.strip_prefix("data:") {
        if let Some((_, tail)) = rest.split_once(',') {
            if let Some(inner) = tail.strip_prefix("data:") {
                warn!("Repairing nested data URL prefix");
                return format!("data:{}", inner);
            }
        }
    }
    url
}
