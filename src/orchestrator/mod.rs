//! Orchestration of a single question against a remote agent.
//!
//! # Key Concepts
//! - Orchestrator: drives agent, thread, message, run and transcript calls
//! - AgentLease: guarantees the remote agent is deleted on every exit path
//! - Step decoder: normalizes recorded tool invocations into `ToolCall`s
//! - Response assembler: merges text and images into one answer string

mod error;
mod lease;
mod response;
mod run;
mod steps;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AgentError, StepDecodeError, BUDGET_EXCEEDED_MESSAGE, GENERIC_FAILURE_MESSAGE};
pub use lease::AgentLease;
pub use response::{answer_message, assemble, referenced_files, NO_RESPONSE_PLACEHOLDER};
pub use run::{AgentResult, Orchestrator};
pub use steps::{decode_step, decode_steps, ToolCall, ToolInvocation};
