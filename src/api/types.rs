//! API request and response types.

use serde::{Deserialize, Serialize};

/// A question submitted by the user.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    /// Free-text question
    pub text: String,
}

/// Body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Message safe to show the end user
    pub error: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}
