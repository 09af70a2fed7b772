//! # Fingertips Agent
//!
//! Answers public-health data questions by running an ephemeral remote agent
//! with access to the Fingertips data API and a code interpreter.
//!
//! ## Request Flow
//!
//! ```text
//!   question ──► BudgetGate ──► create agent ──► thread ──► message ──► run
//!                    │                                                   │
//!               UsageMetrics                                      poll until terminal
//!                                                                        │
//!   AgentResult ◄── assemble answer ◄── decode steps ◄── steps + messages ◄┘
//!                         (agent deleted on every path)
//! ```
//!
//! ## Modules
//! - `budget`: spend ceiling checked before any remote work
//! - `usage`: live token counters from the hosting resource's metrics
//! - `platform`: hosted agents API trait and REST client
//! - `tools`: the tool set handed to every agent
//! - `orchestrator`: run lifecycle, step decoding, answer assembly
//! - `api`: HTTP surface

pub mod api;
pub mod budget;
pub mod config;
pub mod orchestrator;
pub mod platform;
pub mod tools;
pub mod usage;

pub use config::Config;
pub use orchestrator::{AgentError, AgentResult, Orchestrator, ToolCall};
