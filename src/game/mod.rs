//! Game Module
//!
//! The session side of the visual novel: character profiles, persisted
//! game data, dialogue with the chat model, reply-driven image generation
//! and the session context tying them together.

pub mod classify;
mod dialogue;
mod images;
mod profile;
pub mod sdk;
mod session;
mod storage;

// Re-export public types
pub use classify::{classify, Detection, EmotionKind, SceneKind};
pub use dialogue::{
    post_process_reply, validate_input, DialogueSession, DialogueStats, MAX_MESSAGE_CHARS,
};
pub use images::{GeneratedVisual, ImageGenerator, VisualKind};
pub use profile::CharacterProfile;
pub use sdk::{ChatClient, ChatPersona, ChatRole, GeneratedImage, ImageClient, ImageRequest};
pub use session::{SessionContext, SessionServices, Turn};
pub use storage::{
    default_save_name, DialogueEntry, GameData, GameStorage, SaveFile, Sender,
    SAVE_FORMAT_VERSION,
};
