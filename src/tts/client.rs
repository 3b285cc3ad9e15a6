//! TTS Client
//!
//! Turns dialogue text into audio: picks a voice for the character, tags
//! the detected emotion, posts to the proxy and reassembles the streamed
//! answer.

use tracing::{debug, info};

use crate::cache::current_timestamp_ms;
use crate::error::{AppError, Result};
use crate::game::classify::detect_voice_emotion;
use crate::game::CharacterProfile;
use crate::models::{AudioParams, TtsRequest, TtsRequestParams, TtsUser};
use crate::stream::reassemble;

pub const FEMALE_SPEAKER: &str = "zh_female_cancan_mars_bigtts";
pub const MALE_SPEAKER: &str = "zh_male_ahu_conversation_wvae_bigtts";

const AUDIO_FORMAT: &str = "mp3";
const SAMPLE_RATE: u32 = 24_000;
const RATE_RANGE: (i32, i32) = (-50, 100);

// == Voice Profile ==
/// Speaker and prosody chosen for a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceProfile {
    pub speaker: String,
    pub speech_rate: i32,
    pub loudness_rate: i32,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            speaker: FEMALE_SPEAKER.to_string(),
            speech_rate: 0,
            loudness_rate: 0,
        }
    }
}

impl VoiceProfile {
    /// Voice for `profile`: speaker by gender, rates by persona keywords.
    pub fn for_character(profile: &CharacterProfile) -> Self {
        let speaker = match profile.gender.as_str() {
            "male" => MALE_SPEAKER,
            _ => FEMALE_SPEAKER,
        };

        let settings = profile.settings.as_str();
        let has = |words: &[&str]| words.iter().any(|w| settings.contains(w));

        let speech_rate = if has(&["活泼", "开朗"]) {
            10
        } else if has(&["温柔", "文静"]) {
            -10
        } else if has(&["急性子", "急躁"]) {
            20
        } else if has(&["慢性子", "悠闲"]) {
            -20
        } else {
            0
        };

        let loudness_rate = if has(&["害羞", "内向"]) {
            -10
        } else if has(&["外向", "大声"]) {
            10
        } else {
            0
        };

        Self {
            speaker: speaker.to_string(),
            speech_rate: speech_rate.clamp(RATE_RANGE.0, RATE_RANGE.1),
            loudness_rate: loudness_rate.clamp(RATE_RANGE.0, RATE_RANGE.1),
        }
    }
}

// == TTS Client ==
#[derive(Debug, Clone)]
pub struct TtsClient {
    http: reqwest::Client,
    /// Proxy endpoint, e.g. `http://localhost:3001/api/tts`
    endpoint: String,
    voice: VoiceProfile,
}

impl TtsClient {
    pub fn new(endpoint: impl Into<String>, voice: VoiceProfile) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            voice,
        }
    }

    pub fn voice(&self) -> &VoiceProfile {
        &self.voice
    }

    pub fn set_voice(&mut self, voice: VoiceProfile) {
        self.voice = voice;
    }

    /// Request body for `text`, with the emotion detected in it.
    pub fn build_request(&self, text: &str) -> TtsRequest {
        let emotion = detect_voice_emotion(text);
        TtsRequest {
            user: TtsUser {
                uid: format!("ai_galgame_user_{}", current_timestamp_ms()),
            },
            req_params: TtsRequestParams {
                text: text.to_string(),
                speaker: self.voice.speaker.clone(),
                audio_params: AudioParams {
                    format: AUDIO_FORMAT.to_string(),
                    sample_rate: SAMPLE_RATE,
                    speech_rate: self.voice.speech_rate,
                    loudness_rate: self.voice.loudness_rate,
                    emotion: emotion.map(|e| e.kind.as_str().to_string()),
                    emotion_scale: emotion.map(|e| e.scale.clamp(1, 5)),
                },
            },
        }
    }

    // == Synthesize ==
    /// Synthesizes `text` into audio bytes. Blank text yields `None`.
    pub async fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let request = self.build_request(text);
        debug!(
            "TTS request: speaker={}, emotion={:?}",
            request.req_params.speaker, request.req_params.audio_params.emotion
        );

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                details,
            });
        }

        let audio = reassemble(response.bytes_stream()).await?;
        info!("Synthesized {} bytes of audio", audio.len());
        Ok(Some(audio))
    }
}
