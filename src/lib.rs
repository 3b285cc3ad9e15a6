//! Galgame Server - back end of an AI visual-novel
//!
//! Image cache with compression and age-based eviction, save-file server,
//! TTS proxy with streamed-response reassembly, and the game session
//! components built on top of them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod game;
pub mod models;
pub mod saves;
pub mod stream;
pub mod tasks;
pub mod tts;

pub use api::{create_router, AppState};
pub use cache::{ImageCache, LocalStore};
pub use config::Config;
pub use error::{AppError, Result};
pub use tasks::spawn_maintenance_task;
