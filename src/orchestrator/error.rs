//! Failure taxonomy for one orchestration.

use std::time::Duration;

use thiserror::Error;

use crate::platform::{PlatformError, RunStatus};
use crate::tools::ToolContractError;
use crate::usage::UsageError;

/// Shown to end users for every failure except budget exhaustion.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Something went wrong while answering your question. Please try again.";

/// Shown to end users when the spending cap has been reached.
pub const BUDGET_EXCEEDED_MESSAGE: &str =
    "Total AI token spend on this free project has been exceeded.";

/// Errors that abort an orchestration.
///
/// Display strings carry remote detail for logs; use [`AgentError::user_message`]
/// for anything shown to an end user.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("project budget exceeded ({:.1}% spent)", .spent_fraction * 100.0)]
    BudgetExceeded { spent_fraction: f64 },

    #[error("usage metrics unavailable: {0}")]
    UsageUnavailable(#[source] UsageError),

    #[error("tool contract unavailable: {0}")]
    ToolContractUnavailable(#[from] ToolContractError),

    #[error("agent creation failed: {0}")]
    AgentCreationFailed(#[source] PlatformError),

    #[error("thread creation failed: {0}")]
    ThreadCreationFailed(#[source] PlatformError),

    #[error("message send failed: {0}")]
    MessageSendFailed(#[source] PlatformError),

    #[error("run creation failed: {0}")]
    RunCreationFailed(#[source] PlatformError),

    #[error("run polling failed: {0}")]
    RunPollFailed(#[source] PlatformError),

    #[error("run ended with status {status}: {message}")]
    RunFailed { status: RunStatus, message: String },

    #[error("run did not finish within {0:?}")]
    RunTimedOut(Duration),

    #[error("failed to fetch run transcript: {0}")]
    TranscriptUnavailable(#[source] PlatformError),

    #[error("request cancelled")]
    Cancelled,
}

impl AgentError {
    /// Safe text for the end user; never includes remote error detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            AgentError::BudgetExceeded { .. } => BUDGET_EXCEEDED_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

/// One step's tool calls could not be normalized. Logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepDecodeError {
    #[error("step {step_id}: unrecognized tool kind '{kind}'")]
    UnrecognizedToolKind { step_id: String, kind: String },

    #[error("step {step_id}: malformed tool call: {reason}")]
    Malformed { step_id: String, reason: String },
}
