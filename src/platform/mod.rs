//! Remote agent platform - the boundary every orchestration talks to.
//!
//! This module provides a trait-based abstraction over the hosted agents API
//! (agents, threads, messages, runs, run steps, files), with the Azure AI
//! Foundry agents REST API as the primary implementation.

mod error;
mod foundry;

pub use error::{classify_http_status, PlatformError, PlatformErrorKind, RetryConfig};
pub use foundry::FoundryClient;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Remotely created agent. Billable until deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentHandle(String);

impl AgentHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote conversation thread; left to expire server-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadHandle(String);

impl ThreadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a run as last observed by polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
    /// Any status this service does not model (e.g. `requires_action`).
    #[serde(other)]
    Other,
}

impl RunStatus {
    /// Whether the run is still waiting on the remote side.
    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Other => "other",
        };
        f.write_str(s)
    }
}

/// Error attached to a run that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// One execution of an agent against a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

/// One recorded unit of work within a run.
///
/// `details` is kept loosely typed; the step decoder owns its interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(rename = "step_details", default)]
    pub details: serde_json::Value,
}

/// Author of a thread message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Text payload of a message content part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// Reference to a file produced by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub file_id: String,
}

/// Content part of a thread message, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentPart {
    Text { text: TextContent },
    ImageFile { image_file: FileReference },
    #[serde(other)]
    Unsupported,
}

impl MessageContentPart {
    /// Create a text content part.
    pub fn text(value: impl Into<String>) -> Self {
        MessageContentPart::Text {
            text: TextContent {
                value: value.into(),
            },
        }
    }

    /// Create an image file content part.
    pub fn image(file_id: impl Into<String>) -> Self {
        MessageContentPart::ImageFile {
            image_file: FileReference {
                file_id: file_id.into(),
            },
        }
    }
}

/// A message in a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Vec<MessageContentPart>,
}

/// A file downloaded from the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// Tool capability handed to a new agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDefinition {
    /// REST API described by a raw OpenAPI document, called anonymously.
    OpenApi {
        name: String,
        description: String,
        spec: Bytes,
    },
    /// Sandboxed code execution.
    CodeInterpreter,
}

/// Everything needed to create an agent.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
}

/// Operations on the hosted agents API.
///
/// Every method is a remote call that may fail with a network or API error.
#[async_trait]
pub trait AgentPlatform: Send + Sync {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, PlatformError>;

    async fn create_thread(&self) -> Result<ThreadHandle, PlatformError>;

    async fn post_message(
        &self,
        thread: &ThreadHandle,
        role: MessageRole,
        text: &str,
    ) -> Result<(), PlatformError>;

    async fn create_run(
        &self,
        thread: &ThreadHandle,
        agent: &AgentHandle,
    ) -> Result<RunHandle, PlatformError>;

    /// Refresh a run's status.
    async fn get_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunHandle, PlatformError>;

    /// List a run's steps, oldest first.
    async fn get_steps(
        &self,
        thread: &ThreadHandle,
        run_id: &str,
    ) -> Result<Vec<StepRecord>, PlatformError>;

    /// List a thread's messages, newest first.
    async fn get_messages(&self, thread: &ThreadHandle) -> Result<Vec<Message>, PlatformError>;

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile, PlatformError>;

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parses_unknown_values() {
        let run: RunHandle =
            serde_json::from_str(r#"{"id":"run_1","status":"requires_action"}"#).unwrap();
        assert_eq!(run.status, RunStatus::Other);
        assert!(!run.status.is_pending());
    }

    #[test]
    fn test_pending_statuses() {
        assert!(RunStatus::Queued.is_pending());
        assert!(RunStatus::InProgress.is_pending());
        for status in [
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
        ] {
            assert!(!status.is_pending(), "{} should be terminal", status);
        }
    }

    #[test]
    fn test_message_content_parts_parse() {
        let message: Message = serde_json::from_str(
            r#"{
                "id": "msg_1",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": {"value": "Hello", "annotations": []}},
                    {"type": "image_file", "image_file": {"file_id": "assistant-abc"}},
                    {"type": "image_url", "image_url": {"url": "https://x"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            message.content,
            vec![
                MessageContentPart::text("Hello"),
                MessageContentPart::image("assistant-abc"),
                MessageContentPart::Unsupported,
            ]
        );
    }
}
