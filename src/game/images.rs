//! Image Generator
//!
//! Character portraits and scene backgrounds, served from the image cache
//! when possible and generated otherwise.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{Descriptor, ImageCache, PutOutcome};
use crate::error::Result;
use crate::game::classify::{classify, Detection, EmotionKind};
use crate::game::sdk::{extract_image_url, ImageClient, ImageRequest};
use crate::game::CharacterProfile;

const IMAGE_SIZE: &str = "1024x1024";
const SCENE_QUALITY: &str = "hd";

fn scene_prompt(description: &str) -> String {
    format!(
        "Ultra high quality anime background scene, {}, masterpiece, best quality, highly \
         detailed environment, crisp sharp details, professional anime art style, 8K resolution, \
         perfect lighting, no blur, crystal clear",
        description
    )
}

// == Generated Visual ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Background,
    Character,
}

/// An image produced in reaction to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedVisual {
    pub kind: VisualKind,
    pub url: String,
}

// == Image Generator ==
pub struct ImageGenerator {
    client: Box<dyn ImageClient>,
    cache: Arc<RwLock<ImageCache>>,
}

impl ImageGenerator {
    pub fn new(client: Box<dyn ImageClient>, cache: Arc<RwLock<ImageCache>>) -> Self {
        Self { client, cache }
    }

    async fn generate(&self, request: ImageRequest) -> Result<String> {
        debug!("Generating image: {}", request.prompt);
        let image = self.client.generate_image(request).await?;
        extract_image_url(&image)
    }

    async fn cached(&self, descriptor: &Descriptor) -> Option<String> {
        self.cache
            .write()
            .await
            .get_verified(descriptor)
            .map(|entry| entry.image_url)
    }

    async fn remember(&self, descriptor: &Descriptor, url: &str) {
        if self.cache.write().await.put(descriptor, url).await == PutOutcome::Dropped {
            warn!("Generated image was not cached");
        }
    }

    // == Portraits ==
    /// The character's neutral portrait, cached per character.
    pub async fn character_portrait(&self, profile: &CharacterProfile) -> Result<String> {
        let descriptor = profile.descriptor();
        if let Some(url) = self.cached(&descriptor).await {
            info!("Using cached portrait for {}", profile.nickname);
            return Ok(url);
        }

        let url = self
            .generate(ImageRequest {
                prompt: profile.image_prompt()?,
                size: IMAGE_SIZE.to_string(),
                quality: None,
            })
            .await?;
        self.remember(&descriptor, &url).await;
        Ok(url)
    }

    /// A portrait showing `emotion`. Not cached.
    pub async fn contextual_portrait(
        &self,
        profile: &CharacterProfile,
        emotion: EmotionKind,
    ) -> Result<String> {
        let prompt = format!("{}, {} expression", profile.image_prompt()?, emotion.as_str());
        self.generate(ImageRequest {
            prompt,
            size: IMAGE_SIZE.to_string(),
            quality: None,
        })
        .await
    }

    // == Backgrounds ==
    /// A background for `description`, cached per description.
    pub async fn scene_background(&self, description: &str) -> Result<String> {
        let descriptor = Descriptor::Scene(description.to_string());
        if let Some(url) = self.cached(&descriptor).await {
            info!("Using cached background for scene: {}", description);
            return Ok(url);
        }

        let url = self
            .generate(ImageRequest {
                prompt: scene_prompt(description),
                size: IMAGE_SIZE.to_string(),
                quality: Some(SCENE_QUALITY.to_string()),
            })
            .await?;
        self.remember(&descriptor, &url).await;
        Ok(url)
    }

    // == Reply Analysis ==
    /// Generates the visual a reply calls for, if any.
    ///
    /// Generation failures are logged and yield `None` so the dialogue
    /// carries on without an image.
    pub async fn analyze_and_generate(
        &self,
        reply: &str,
        profile: &CharacterProfile,
    ) -> Option<GeneratedVisual> {
        let result = match classify(reply) {
            Detection::None => return None,
            Detection::Scene(scene) => {
                info!("Scene change detected: {}", scene.as_str());
                self.scene_background(&scene.description())
                    .await
                    .map(|url| GeneratedVisual {
                        kind: VisualKind::Background,
                        url,
                    })
            }
            Detection::Emotion(emotion) => {
                info!("Emotion detected: {}", emotion.as_str());
                self.contextual_portrait(profile, emotion)
                    .await
                    .map(|url| GeneratedVisual {
                        kind: VisualKind::Character,
                        url,
                    })
            }
        };

        result
            .map_err(|e| warn!("Image generation for reply failed: {}", e))
            .ok()
    }
}

// == Unit Tests ==
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::LocalStore;
    use crate::error::AppError;
    use crate::game::profile::tests::ai_form;
    use crate::game::sdk::GeneratedImage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Image service that answers with a remote URL per request.
    #[derive(Default)]
    pub(crate) struct RecordingImages {
        pub requests: Arc<Mutex<Vec<ImageRequest>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl ImageClient for RecordingImages {
        async fn generate_image(&self, request: ImageRequest) -> Result<GeneratedImage> {
            if self.fail {
                return Err(AppError::Network("image service unreachable".to_string()));
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            Ok(GeneratedImage {
                url: Some(format!("https://img.example.com/{}.png", requests.len())),
                ..GeneratedImage::default()
            })
        }
    }

    fn cache() -> Arc<RwLock<ImageCache>> {
        Arc::new(RwLock::new(ImageCache::open(LocalStore::in_memory(1024 * 1024))))
    }

    fn profile() -> CharacterProfile {
        CharacterProfile::create_ai(&ai_form()).unwrap()
    }

    #[tokio::test]
    async fn test_portrait_is_generated_once_then_cached() {
        let images = RecordingImages::default();
        let requests = images.requests.clone();
        let cache = cache();
        let generator = ImageGenerator::new(Box::new(images), cache.clone());

        let first = generator.character_portrait(&profile()).await.unwrap();
        let second = generator.character_portrait(&profile()).await.unwrap();
        assert_eq!(first, "https://img.example.com/1.png");
        assert_eq!(second, first);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].size, "1024x1024");
        assert_eq!(requests[0].quality, None);

        let stats = cache.read().await.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_scene_background_uses_hd_and_cache() {
        let images = RecordingImages::default();
        let requests = images.requests.clone();
        let generator = ImageGenerator::new(Box::new(images), cache());

        generator.scene_background("quiet anime library").await.unwrap();
        generator.scene_background("quiet anime library").await.unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].quality.as_deref(), Some("hd"));
        assert!(requests[0]
            .prompt
            .starts_with("Ultra high quality anime background scene, quiet anime library,"));
    }

    #[tokio::test]
    async fn test_analyze_scene_reply() {
        let images = RecordingImages::default();
        let requests = images.requests.clone();
        let generator = ImageGenerator::new(Box::new(images), cache());

        let visual = generator
            .analyze_and_generate("我们去公园散步吧", &profile())
            .await
            .unwrap();
        assert_eq!(visual.kind, VisualKind::Background);
        assert!(requests.lock().unwrap()[0].prompt.contains("beautiful anime park scene"));
    }

    #[tokio::test]
    async fn test_analyze_emotion_reply() {
        let images = RecordingImages::default();
        let requests = images.requests.clone();
        let generator = ImageGenerator::new(Box::new(images), cache());

        let visual = generator
            .analyze_and_generate("今天好开心", &profile())
            .await
            .unwrap();
        assert_eq!(visual.kind, VisualKind::Character);
        assert!(requests.lock().unwrap()[0].prompt.ends_with(", happy expression"));
    }

    #[tokio::test]
    async fn test_analyze_plain_reply_and_failures() {
        let generator = ImageGenerator::new(Box::new(RecordingImages::default()), cache());
        assert!(generator.analyze_and_generate("嗯", &profile()).await.is_none());

        let failing = RecordingImages {
            fail: true,
            ..RecordingImages::default()
        };
        let generator = ImageGenerator::new(Box::new(failing), cache());
        assert!(generator
            .analyze_and_generate("今天好开心", &profile())
            .await
            .is_none());
        assert!(generator.character_portrait(&profile()).await.is_err());
    }
}
