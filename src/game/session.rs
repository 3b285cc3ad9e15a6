//! Session Context
//!
//! Everything a game session needs, built once when the session starts and
//! torn down when it ends: storage, image cache, dialogue, image
//! generation and speech synthesis.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{ImageCache, LocalStore};
use crate::error::{AppError, Result};
use crate::game::classify::{default_scene, detect_scene};
use crate::game::dialogue::DialogueSession;
use crate::game::images::{GeneratedVisual, ImageGenerator, VisualKind};
use crate::game::sdk::{ChatClient, ImageClient};
use crate::game::storage::{GameStorage, SaveFile};
use crate::game::CharacterProfile;
use crate::tts::{TtsClient, VoiceProfile};

const MISSING_PROFILES: &str = "未找到角色配置";

/// External services a session talks to.
pub struct SessionServices {
    pub chat: Box<dyn ChatClient>,
    pub images: Box<dyn ImageClient>,
    /// TTS proxy endpoint
    pub tts_endpoint: String,
}

/// Result of one dialogue turn.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: String,
    pub visual: Option<GeneratedVisual>,
}

// == Session Context ==
pub struct SessionContext {
    storage: GameStorage,
    cache: Arc<RwLock<ImageCache>>,
    dialogue: DialogueSession,
    images: ImageGenerator,
    tts: TtsClient,
    player: CharacterProfile,
    ai: CharacterProfile,
    scene: String,
}

impl SessionContext {
    // == Start ==
    /// Starts a session over the profiles saved in `store`.
    ///
    /// A fresh dialogue begins with the AI's opening line.
    pub fn start(store: LocalStore, services: SessionServices) -> Result<Self> {
        let storage = GameStorage::new(store.clone());
        let (player, ai) = match (storage.load_player_profile(), storage.load_ai_profile()) {
            (Some(player), Some(ai)) => (player, ai),
            _ => return Err(AppError::NotFound(MISSING_PROFILES.to_string())),
        };

        let cache = Arc::new(RwLock::new(ImageCache::open(store)));
        let dialogue = DialogueSession::new(&ai, services.chat, storage.clone())?;
        if dialogue.history().is_empty() {
            dialogue.record_opening(&ai.opening);
        }

        let scene = default_scene(&ai.settings).to_string();
        info!("Session started: {} meets {}", player.nickname, ai.nickname);

        Ok(Self {
            images: ImageGenerator::new(services.images, cache.clone()),
            tts: TtsClient::new(services.tts_endpoint, VoiceProfile::for_character(&ai)),
            storage,
            cache,
            dialogue,
            player,
            ai,
            scene,
        })
    }

    // == Accessors ==
    pub fn player(&self) -> &CharacterProfile {
        &self.player
    }

    pub fn ai(&self) -> &CharacterProfile {
        &self.ai
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn dialogue(&self) -> &DialogueSession {
        &self.dialogue
    }

    pub fn images(&self) -> &ImageGenerator {
        &self.images
    }

    pub fn cache(&self) -> &Arc<RwLock<ImageCache>> {
        &self.cache
    }

    pub fn storage(&self) -> &GameStorage {
        &self.storage
    }

    // == Opening Visuals ==
    /// Portrait and default background for the first screen. Either may be
    /// missing if generation fails.
    pub async fn opening_visuals(&self) -> (Option<String>, Option<String>) {
        let portrait = self
            .images
            .character_portrait(&self.ai)
            .await
            .map_err(|e| warn!("Portrait generation failed: {}", e))
            .ok();
        let background = self
            .images
            .scene_background(&self.scene)
            .await
            .map_err(|e| warn!("Background generation failed: {}", e))
            .ok();
        (portrait, background)
    }

    // == Dialogue Turn ==
    /// Sends a player message, then generates the visual the reply calls for.
    pub async fn send(
        &mut self,
        message: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<Turn> {
        let reply = self.dialogue.send_stream(message, on_delta).await?;
        let visual = self.images.analyze_and_generate(&reply, &self.ai).await;
        if let Some(GeneratedVisual {
            kind: VisualKind::Background,
            ..
        }) = &visual
        {
            if let Some(scene) = detect_scene(&reply) {
                self.scene = scene.description();
            }
        }
        Ok(Turn { reply, visual })
    }

    /// Reads `text` aloud in the AI character's voice.
    pub async fn speak(&self, text: &str) -> Result<Option<Vec<u8>>> {
        self.tts.synthesize(text).await
    }

    // == Save Files ==
    pub fn export_save(&self, save_name: Option<String>) -> SaveFile {
        SaveFile::new(save_name, self.storage.collect_all())
    }

    /// Restores a save file into the store. Takes effect on the next start.
    pub fn import_save(&self, save: &SaveFile) -> Result<()> {
        self.storage.restore_all(&save.game_data)
    }

    // == End ==
    /// Persists the session state and releases its resources.
    pub fn end(self) -> Result<()> {
        self.storage.save_game_state(&json!({
            "scene": self.scene,
            "messageCount": self.dialogue.history().len(),
        }))?;
        info!("Session ended for {}", self.ai.nickname);
        Ok(())
    }
}
