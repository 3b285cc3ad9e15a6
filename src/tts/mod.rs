//! Speech Synthesis Module
//!
//! The server-side proxy that forwards synthesis requests to the TTS
//! backend with credentials attached, and the client that turns dialogue
//! text into audio through that proxy.

mod client;
mod proxy;

pub use client::{TtsClient, VoiceProfile, FEMALE_SPEAKER, MALE_SPEAKER};
pub use proxy::TtsProxy;
