//! Request and Response models for the galgame server API
//!
//! DTOs for HTTP request and response bodies. Field names are camelCase on
//! the wire to match the browser client.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{AudioParams, SaveRequest, TtsRequest, TtsRequestParams, TtsUser};
pub use responses::{
    HealthConfig, HealthResponse, LoadResponse, SaveListResponse, SaveResponse, SaveSummary,
    StatsResponse,
};
