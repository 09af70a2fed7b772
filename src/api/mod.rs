//! HTTP API for the Fingertips agent.
//!
//! ## Endpoints
//!
//! - `POST /api/ask` - Answer a question with a fresh agent run
//! - `GET /api/usage` - Current token spend against the project budget
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
