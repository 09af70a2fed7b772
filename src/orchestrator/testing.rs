//! In-memory test doubles for the platform and usage collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;

use crate::platform::{
    AgentHandle, AgentPlatform, AgentSpec, Message, MessageContentPart, MessageRole,
    PlatformError, RemoteFile, RunError, RunHandle, RunStatus, StepRecord, ThreadHandle,
};
use crate::usage::{TokenTotals, UsageError, UsageMetrics};

/// Remote call at which a [`RecordingPlatform`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CreateAgent,
    CreateThread,
    PostMessage,
    CreateRun,
    GetRun,
    GetSteps,
    GetMessages,
    GetFile,
}

/// Scripted platform that records every call it receives.
pub struct RecordingPlatform {
    calls: Mutex<Vec<&'static str>>,
    deleted: Mutex<Vec<AgentHandle>>,
    statuses: Mutex<VecDeque<RunStatus>>,
    last_error: Option<RunError>,
    fail_at: Option<Stage>,
    fail_delete: bool,
    create_delay: Option<Duration>,
    steps: Vec<StepRecord>,
    messages: Vec<Message>,
    files: HashMap<String, RemoteFile>,
    agents_created: AtomicUsize,
    pub polled: Notify,
}

impl RecordingPlatform {
    /// A platform whose run completes on the second poll with a one-line answer.
    pub fn completing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::from([RunStatus::InProgress, RunStatus::Completed])),
            last_error: None,
            fail_at: None,
            fail_delete: false,
            create_delay: None,
            steps: Vec::new(),
            messages: vec![Message {
                id: "msg_answer".to_string(),
                role: MessageRole::Assistant,
                content: vec![MessageContentPart::text("The answer is 42.")],
            }],
            files: HashMap::new(),
            agents_created: AtomicUsize::new(0),
            polled: Notify::new(),
        }
    }

    /// Statuses returned by successive polls; the last one repeats forever.
    pub fn with_statuses(self, statuses: Vec<RunStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_last_error(mut self, message: &str) -> Self {
        self.last_error = Some(RunError {
            code: Some("server_error".to_string()),
            message: message.to_string(),
        });
        self
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Agent creation takes effect remotely, then the response is delayed.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    pub fn with_steps(mut self, steps: Vec<StepRecord>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_file(mut self, file_id: &str, filename: &str, bytes: &'static [u8]) -> Self {
        self.files.insert(
            file_id.to_string(),
            RemoteFile {
                filename: filename.to_string(),
                bytes: Bytes::from_static(bytes),
            },
        );
        self
    }

    /// Names of every remote call received, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deleted_agents(&self) -> Vec<AgentHandle> {
        self.deleted.lock().unwrap().clone()
    }

    /// Agents that exist remotely, whether or not their handle was returned.
    pub fn agents_created(&self) -> usize {
        self.agents_created.load(Ordering::SeqCst)
    }

    fn record(&self, name: &'static str, stage: Option<Stage>) -> Result<(), PlatformError> {
        self.calls.lock().unwrap().push(name);
        if stage.is_some() && stage == self.fail_at {
            return Err(PlatformError::server_error(500, format!("injected {} failure", name)));
        }
        Ok(())
    }

    fn run(&self, status: RunStatus) -> RunHandle {
        RunHandle {
            id: "run_1".to_string(),
            status,
            last_error: if status == RunStatus::Completed {
                None
            } else {
                self.last_error.clone()
            },
        }
    }
}

#[async_trait]
impl AgentPlatform for RecordingPlatform {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, PlatformError> {
        self.record("create_agent", Some(Stage::CreateAgent))?;
        assert!(!spec.tools.is_empty(), "agents are always created with tools");
        let n = self.agents_created.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(AgentHandle::new(format!("asst_{}", n)))
    }

    async fn create_thread(&self) -> Result<ThreadHandle, PlatformError> {
        self.record("create_thread", Some(Stage::CreateThread))?;
        Ok(ThreadHandle::new("thread_1"))
    }

    async fn post_message(
        &self,
        _thread: &ThreadHandle,
        _role: MessageRole,
        _text: &str,
    ) -> Result<(), PlatformError> {
        self.record("post_message", Some(Stage::PostMessage))
    }

    async fn create_run(
        &self,
        _thread: &ThreadHandle,
        _agent: &AgentHandle,
    ) -> Result<RunHandle, PlatformError> {
        self.record("create_run", Some(Stage::CreateRun))?;
        Ok(self.run(RunStatus::Queued))
    }

    async fn get_run(&self, _thread: &ThreadHandle, _run_id: &str) -> Result<RunHandle, PlatformError> {
        self.record("get_run", Some(Stage::GetRun))?;
        self.polled.notify_one();
        let status = {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front().unwrap_or(RunStatus::Completed)
            } else {
                statuses.front().copied().unwrap_or(RunStatus::Completed)
            }
        };
        Ok(self.run(status))
    }

    async fn get_steps(
        &self,
        _thread: &ThreadHandle,
        _run_id: &str,
    ) -> Result<Vec<StepRecord>, PlatformError> {
        self.record("get_steps", Some(Stage::GetSteps))?;
        Ok(self.steps.clone())
    }

    async fn get_messages(&self, _thread: &ThreadHandle) -> Result<Vec<Message>, PlatformError> {
        self.record("get_messages", Some(Stage::GetMessages))?;
        Ok(self.messages.clone())
    }

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile, PlatformError> {
        self.record("get_file", Some(Stage::GetFile))?;
        self.files
            .get(file_id)
            .cloned()
            .ok_or_else(|| PlatformError::client_error(404, format!("no file {}", file_id)))
    }

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), PlatformError> {
        self.record("delete_agent", None)?;
        self.deleted.lock().unwrap().push(agent.clone());
        if self.fail_delete {
            return Err(PlatformError::server_error(503, "injected delete failure".to_string()));
        }
        Ok(())
    }
}

/// Usage source returning fixed totals (or failing, or never answering) and
/// counting reads.
pub struct StaticUsage {
    totals: Option<TokenTotals>,
    hang: bool,
    reads: AtomicUsize,
}

impl StaticUsage {
    pub fn tokens(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            totals: Some(TokenTotals {
                prompt_tokens,
                completion_tokens,
            }),
            hang: false,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            totals: None,
            hang: false,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::tokens(0, 0)
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageMetrics for StaticUsage {
    async fn lifetime_usage(&self) -> Result<TokenTotals, UsageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.totals
            .ok_or_else(|| UsageError::Request("metrics endpoint unreachable".to_string()))
    }
}
