//! Game Storage
//!
//! Typed access to profiles, dialogue history and game state in the local
//! store, and the portable save-file document built from them.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::cache::{
    current_timestamp_ms, LocalStore, BACKGROUND_IMAGES_KEY, CACHE_VERSION, CHARACTER_IMAGES_KEY,
    IMAGE_CACHE_VERSION_KEY,
};
use crate::error::{AppError, Result};
use crate::game::CharacterProfile;

// == Store Keys ==
pub const PLAYER_PROFILE_KEY: &str = "ai_galgame_player_profile";
pub const AI_PROFILE_KEY: &str = "ai_galgame_ai_profile";
pub const DIALOGUE_HISTORY_KEY: &str = "ai_galgame_dialogue_history";
pub const GAME_STATE_KEY: &str = "ai_galgame_state";
pub const LAST_PLAY_TIME_KEY: &str = "ai_galgame_last_play_time";

const ALL_KEYS: [&str; 8] = [
    PLAYER_PROFILE_KEY,
    AI_PROFILE_KEY,
    DIALOGUE_HISTORY_KEY,
    GAME_STATE_KEY,
    LAST_PLAY_TIME_KEY,
    CHARACTER_IMAGES_KEY,
    BACKGROUND_IMAGES_KEY,
    IMAGE_CACHE_VERSION_KEY,
];

/// Version written into save files.
pub const SAVE_FORMAT_VERSION: &str = "1.0.0";

// == Dialogue Entry ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Player,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEntry {
    /// Unix milliseconds
    pub timestamp: u64,
    pub sender: Sender,
    pub message: String,
}

impl DialogueEntry {
    pub fn now(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp_ms(),
            sender,
            message: message.into(),
        }
    }
}

// == Save File ==
/// Everything a save file carries. Absent parts are left untouched on restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameData {
    pub player_profile: Option<CharacterProfile>,
    pub ai_profile: Option<CharacterProfile>,
    pub dialogue_history: Option<Vec<DialogueEntry>>,
    pub game_state: Option<Value>,
    pub last_play_time: Option<u64>,
    /// Raw character image cache map
    pub character_images: Option<Value>,
    /// Raw background image cache map
    pub background_images: Option<Value>,
    pub cache_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFile {
    pub save_name: String,
    pub save_time: DateTime<Utc>,
    pub version: String,
    pub game_data: GameData,
}

/// `存档_YYYYMMDD_HHMM` in local time.
pub fn default_save_name(now: DateTime<Local>) -> String {
    now.format("存档_%Y%m%d_%H%M").to_string()
}

impl SaveFile {
    pub fn new(save_name: Option<String>, game_data: GameData) -> Self {
        Self {
            save_name: save_name.unwrap_or_else(|| default_save_name(Local::now())),
            save_time: Utc::now(),
            version: SAVE_FORMAT_VERSION.to_string(),
            game_data,
        }
    }

    /// Parses a save document, rejecting ones without `gameData` or `version`.
    pub fn parse(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|_| AppError::InvalidRequest("存档文件格式错误".to_string()))?;
        if value.get("gameData").is_none() || value.get("version").is_none() {
            return Err(AppError::InvalidRequest("存档格式无效".to_string()));
        }
        serde_json::from_value(value)
            .map_err(|_| AppError::InvalidRequest("存档文件格式错误".to_string()))
    }
}

// == Game Storage ==
#[derive(Debug, Clone)]
pub struct GameStorage {
    store: LocalStore,
}

impl GameStorage {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))?;
        self.store.set(key, json)?;
        Ok(())
    }

    fn load_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to parse {}: {}", key, e);
                None
            }
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key)?;
        Ok(())
    }

    // == Profiles ==
    pub fn save_player_profile(&self, profile: &CharacterProfile) -> Result<()> {
        self.save_json(PLAYER_PROFILE_KEY, profile)
    }

    pub fn load_player_profile(&self) -> Option<CharacterProfile> {
        self.load_json(PLAYER_PROFILE_KEY)
    }

    pub fn save_ai_profile(&self, profile: &CharacterProfile) -> Result<()> {
        self.save_json(AI_PROFILE_KEY, profile)
    }

    pub fn load_ai_profile(&self) -> Option<CharacterProfile> {
        self.load_json(AI_PROFILE_KEY)
    }

    pub fn clear_player_profile(&self) -> Result<()> {
        self.remove(PLAYER_PROFILE_KEY)
    }

    pub fn clear_ai_profile(&self) -> Result<()> {
        self.remove(AI_PROFILE_KEY)
    }

    // == Dialogue History ==
    pub fn save_dialogue_history(&self, history: &[DialogueEntry]) -> Result<()> {
        self.save_json(DIALOGUE_HISTORY_KEY, history)
    }

    pub fn load_dialogue_history(&self) -> Vec<DialogueEntry> {
        self.load_json(DIALOGUE_HISTORY_KEY).unwrap_or_default()
    }

    pub fn clear_dialogue_history(&self) -> Result<()> {
        self.remove(DIALOGUE_HISTORY_KEY)
    }

    // == Game State ==
    /// Stores the game state and stamps the last play time.
    pub fn save_game_state(&self, state: &Value) -> Result<()> {
        self.save_json(GAME_STATE_KEY, state)?;
        self.store
            .set(LAST_PLAY_TIME_KEY, current_timestamp_ms().to_string())?;
        Ok(())
    }

    /// The stored state; a value that is not JSON comes back as a string.
    pub fn load_game_state(&self) -> Option<Value> {
        let raw = self.store.get(GAME_STATE_KEY)?;
        Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
    }

    pub fn last_play_time(&self) -> Option<u64> {
        self.store.get(LAST_PLAY_TIME_KEY)?.parse().ok()
    }

    pub fn clear_game_state(&self) -> Result<()> {
        self.remove(GAME_STATE_KEY)?;
        self.remove(LAST_PLAY_TIME_KEY)
    }

    /// True when both profiles are present.
    pub fn has_saved_game(&self) -> bool {
        self.load_player_profile().is_some() && self.load_ai_profile().is_some()
    }

    // == Save File Support ==
    pub fn collect_all(&self) -> GameData {
        GameData {
            player_profile: self.load_player_profile(),
            ai_profile: self.load_ai_profile(),
            dialogue_history: Some(self.load_dialogue_history()),
            game_state: self.load_game_state(),
            last_play_time: self.last_play_time(),
            character_images: self.load_json(CHARACTER_IMAGES_KEY),
            background_images: self.load_json(BACKGROUND_IMAGES_KEY),
            cache_version: Some(CACHE_VERSION.to_string()),
        }
    }

    /// Writes every part present in `data` back to the store.
    pub fn restore_all(&self, data: &GameData) -> Result<()> {
        if let Some(profile) = &data.player_profile {
            self.save_player_profile(profile)?;
        }
        if let Some(profile) = &data.ai_profile {
            self.save_ai_profile(profile)?;
        }
        if let Some(history) = &data.dialogue_history {
            self.save_dialogue_history(history)?;
        }
        if let Some(state) = &data.game_state {
            self.save_json(GAME_STATE_KEY, state)?;
        }
        if let Some(time) = data.last_play_time {
            self.store.set(LAST_PLAY_TIME_KEY, time.to_string())?;
        }
        if let Some(images) = &data.character_images {
            self.save_json(CHARACTER_IMAGES_KEY, images)?;
        }
        if let Some(images) = &data.background_images {
            self.save_json(BACKGROUND_IMAGES_KEY, images)?;
        }
        info!("Game data restored");
        Ok(())
    }

    /// Removes every game key, image caches included.
    pub fn clear_all(&self) -> Result<()> {
        for key in ALL_KEYS {
            self.remove(key)?;
        }
        info!("All game data cleared");
        Ok(())
    }
}
