//! Dialogue Session
//!
//! Sends player messages to the chat model one at a time, records the
//! exchange and persists the history after each reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::game::sdk::{ChatClient, ChatPersona, ChatRole};
use crate::game::storage::{DialogueEntry, GameStorage, Sender};
use crate::game::CharacterProfile;

pub const MAX_MESSAGE_CHARS: usize = 500;
pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const CHAT_HISTORY_LENGTH: usize = 20;
/// Number of entries shown when replaying history on screen.
pub const DISPLAY_HISTORY_LIMIT: usize = 50;

const BUSY_MESSAGE: &str = "正在处理中，请稍候";
const EMPTY_REPLY: &str = "嗯？";
const REPEATABLE_PUNCTUATION: &str = "。！？~，、；：\"'（）【】《》";
const SENTENCE_MARKS: &str = "，。！？~";
const MAX_REPEATED_PHRASE: usize = 4;

// == Input Validation ==
pub fn validate_input(message: &str) -> Result<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest("消息不能为空".to_string()));
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::InvalidRequest(
            "消息长度不能超过500个字符".to_string(),
        ));
    }
    Ok(trimmed)
}

// == Reply Post-Processing ==
/// Trims the reply and removes stuttering left by the chat model.
///
/// Repeated characters collapse to one unless they are punctuation, a short
/// phrase (two to four characters) repeated back to back collapses to a
/// single copy, and any run of three or more sentence marks (`，。！？~`)
/// shrinks to two copies of its last mark.
pub fn post_process_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return EMPTY_REPLY.to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    let chars = collapse_repeated_chars(&chars);
    let chars = collapse_repeated_phrases(&chars);
    limit_sentence_marks(&chars).into_iter().collect()
}

fn collapse_repeated_chars(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    for &c in chars {
        if out.last() == Some(&c) && !REPEATABLE_PUNCTUATION.contains(c) {
            continue;
        }
        out.push(c);
    }
    out
}

fn collapse_repeated_phrases(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let Some(len) = shortest_repeated_phrase(&chars[i..]) else {
            out.push(chars[i]);
            i += 1;
            continue;
        };
        let phrase = &chars[i..i + len];
        let mut end = i + 2 * len;
        while chars.get(end..end + len) == Some(phrase) {
            end += len;
        }
        if len > MAX_REPEATED_PHRASE {
            out.extend_from_slice(&chars[i..end]);
        } else {
            out.extend_from_slice(phrase);
        }
        i = end;
    }
    out
}

/// Length of the shortest phrase (at least two characters on one line) at
/// the start of `chars` that is immediately repeated.
fn shortest_repeated_phrase(chars: &[char]) -> Option<usize> {
    for len in 2..=chars.len() / 2 {
        if chars[..len].contains(&'\n') {
            return None;
        }
        if chars[..len] == chars[len..2 * len] {
            return Some(len);
        }
    }
    None
}

fn limit_sentence_marks(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if !SENTENCE_MARKS.contains(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && SENTENCE_MARKS.contains(chars[i]) {
            i += 1;
        }
        if i - start >= 3 {
            out.extend([chars[i - 1], chars[i - 1]]);
        } else {
            out.extend_from_slice(&chars[start..i]);
        }
    }
    out
}

// == Stats ==
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueStats {
    pub total_messages: usize,
    pub player_messages: usize,
    pub ai_messages: usize,
    pub first_message_time: Option<u64>,
    pub last_message_time: Option<u64>,
    pub is_processing: bool,
}

/// Clears the processing flag when a send finishes, even on error.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// == Dialogue Session ==
pub struct DialogueSession {
    chat: tokio::sync::Mutex<Box<dyn ChatClient>>,
    storage: GameStorage,
    history: Mutex<Vec<DialogueEntry>>,
    processing: AtomicBool,
}

impl DialogueSession {
    /// Configures `chat` with the AI persona and restores saved history if it
    /// belongs to this character (its first AI line is the opening line).
    pub fn new(
        ai_profile: &CharacterProfile,
        mut chat: Box<dyn ChatClient>,
        storage: GameStorage,
    ) -> Result<Self> {
        chat.set_persona(ChatPersona {
            system_prompt: ai_profile.system_prompt()?,
            temperature: CHAT_TEMPERATURE,
            max_history_length: CHAT_HISTORY_LENGTH,
        });

        let saved = storage.load_dialogue_history();
        let belongs = saved
            .iter()
            .find(|e| e.sender == Sender::Ai)
            .map(|e| e.message == ai_profile.opening)
            .unwrap_or(false);

        let history = if belongs {
            chat.clear_history();
            for entry in &saved {
                let role = match entry.sender {
                    Sender::Player => ChatRole::User,
                    Sender::Ai => ChatRole::Assistant,
                };
                chat.append_message(role, &entry.message);
            }
            info!("Restored {} dialogue entries", saved.len());
            saved
        } else {
            if !saved.is_empty() {
                info!("Saved dialogue belongs to another character, discarding");
                storage.clear_dialogue_history()?;
            }
            Vec::new()
        };

        Ok(Self {
            chat: tokio::sync::Mutex::new(chat),
            storage,
            history: Mutex::new(history),
            processing: AtomicBool::new(false),
        })
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<DialogueEntry>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_entry(&self, entry: DialogueEntry) {
        let mut history = self.lock_history();
        history.push(entry);
        if let Err(e) = self.storage.save_dialogue_history(&history) {
            warn!("Failed to persist dialogue history: {}", e);
        }
    }

    // == Send ==
    /// Sends a player message and returns the post-processed reply.
    ///
    /// Streamed fragments of the raw reply are passed to `on_delta`. A send
    /// issued while another is in flight fails with [`AppError::Busy`].
    pub async fn send_stream(
        &self,
        message: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::Busy(BUSY_MESSAGE.to_string()));
        }
        let _guard = ProcessingGuard(&self.processing);

        let message = validate_input(message)?;
        self.push_entry(DialogueEntry::now(Sender::Player, message));

        let raw = self.chat.lock().await.talk_stream(message, on_delta).await?;
        let reply = post_process_reply(&raw);
        debug!("Reply post-processed: {:?} -> {:?}", raw, reply);

        self.push_entry(DialogueEntry::now(Sender::Ai, reply.clone()));
        Ok(reply)
    }

    /// Sends without observing streamed fragments.
    pub async fn send(&self, message: &str) -> Result<String> {
        self.send_stream(message, &mut |_| {}).await
    }

    /// Records the AI's opening line as the first entry of a new dialogue.
    pub fn record_opening(&self, opening: &str) {
        self.push_entry(DialogueEntry::now(Sender::Ai, opening));
    }

    // == History ==
    pub fn history(&self) -> Vec<DialogueEntry> {
        self.lock_history().clone()
    }

    /// The last [`DISPLAY_HISTORY_LIMIT`] entries.
    pub fn recent_history(&self) -> Vec<DialogueEntry> {
        let history = self.lock_history();
        let start = history.len().saturating_sub(DISPLAY_HISTORY_LIMIT);
        history[start..].to_vec()
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.lock_history().clear();
        self.storage.clear_dialogue_history()?;
        self.chat.lock().await.clear_history();
        Ok(())
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DialogueStats {
        let history = self.lock_history();
        let player = history.iter().filter(|e| e.sender == Sender::Player).count();
        DialogueStats {
            total_messages: history.len(),
            player_messages: player,
            ai_messages: history.len() - player,
            first_message_time: history.first().map(|e| e.timestamp),
            last_message_time: history.last().map(|e| e.timestamp),
            is_processing: self.is_processing(),
        }
    }
}
