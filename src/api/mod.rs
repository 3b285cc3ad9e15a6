//! API Module
//!
//! HTTP handlers and routing for the galgame server REST API.
//!
//! # Endpoints
//! - `POST /api/save` - Write a save file
//! - `GET /api/saves` - List save files
//! - `GET /api/save/:fileName` - Read a save file
//! - `GET /api/health` - Health check endpoint
//! - `POST /api/tts` - TTS proxy
//! - `GET /api/cache/stats` - Image cache statistics

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
