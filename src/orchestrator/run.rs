//! Run orchestrator - one ephemeral agent per user question.
//!
//! `Idle -> AgentCreated -> ThreadCreated -> MessageSent -> RunPending -> RunTerminal -> Cleaned`
//!
//! The budget gate runs before any platform call. Once an agent exists it is
//! held by an [`AgentLease`] and deleted on every exit path, including
//! cancellation and timeouts. Every remote call, the usage query included,
//! races the caller's cancellation token and a per-call timeout. Agent
//! creation runs on its own task so an abandoned request cannot orphan an
//! agent the platform has already created.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::AgentError;
use super::lease::AgentLease;
use super::response::{answer_message, assemble, referenced_files};
use super::steps::{decode_steps, ToolCall};
use crate::budget::{BudgetGate, UsageSnapshot};
use crate::config::{Config, RunTiming};
use crate::platform::{
    AgentHandle, AgentPlatform, AgentSpec, FoundryClient, Message, MessageRole, PlatformError,
    RemoteFile, RunStatus, StepRecord, ThreadHandle,
};
use crate::tools::ToolContract;
use crate::usage::{AzureMonitorUsage, UsageError};

const AGENT_NAME: &str = "Fingertips Health Data Assistant (v3.1)";

const INSTRUCTIONS: &str = "You are a helpful assistant that can access and analyze public health data \
from the Fingertips dataset. Use the fingertips_api_reduced tool to retrieve data when needed. \
The area type IDs available are: 7 - GP Practice; 170, 173 and 180 - Council; \
54, 56, 58, 60 and 63 - CCG or sub-ICB location; Primary Care Network (PCN) - 204";

/// Everything returned to the caller for one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub answer_text: String,
    pub usage: UsageSnapshot,
    pub tool_calls: Vec<ToolCall>,
}

/// Raw output of a completed run, before decoding.
struct Transcript {
    steps: Vec<StepRecord>,
    messages: Vec<Message>,
    files: HashMap<String, RemoteFile>,
}

/// Why a single remote call did not produce a value.
enum CallError {
    Remote(PlatformError),
    Cancelled,
    TimedOut(Duration),
}

impl CallError {
    fn into_agent_error(self, stage: fn(PlatformError) -> AgentError) -> AgentError {
        match self {
            CallError::Remote(e) => stage(e),
            CallError::Cancelled => AgentError::Cancelled,
            CallError::TimedOut(limit) => AgentError::RunTimedOut(limit),
        }
    }
}

fn usage_timeout(limit: Duration) -> AgentError {
    tracing::error!("Usage metrics did not answer within {:?}", limit);
    AgentError::UsageUnavailable(UsageError::Timeout(limit))
}

#[derive(Clone)]
pub struct Orchestrator {
    platform: Arc<dyn AgentPlatform>,
    gate: BudgetGate,
    contract_path: PathBuf,
    model: String,
    timing: RunTiming,
}

impl Orchestrator {
    pub fn new(
        platform: Arc<dyn AgentPlatform>,
        gate: BudgetGate,
        contract_path: PathBuf,
        model: String,
        timing: RunTiming,
    ) -> Self {
        Self {
            platform,
            gate,
            contract_path,
            model,
            timing,
        }
    }

    /// Wire the HTTP-backed platform and metrics clients from configuration.
    pub fn from_config(config: &Config) -> Self {
        let platform = Arc::new(FoundryClient::new(&config.platform));
        let usage = Arc::new(AzureMonitorUsage::new(&config.usage));
        Self::new(
            platform,
            BudgetGate::new(usage, config.pricing),
            config.tool_contract_path.clone(),
            config.platform.model_deployment.clone(),
            config.timing.clone(),
        )
    }

    /// Current spend, read with the same per-call timeout as a request.
    pub async fn usage(&self) -> Result<UsageSnapshot, AgentError> {
        let limit = self.timing.call_timeout;
        tokio::time::timeout(limit, self.gate.snapshot())
            .await
            .unwrap_or_else(|_| Err(usage_timeout(limit)))
    }

    /// Answer one user question with a freshly created agent.
    ///
    /// # Errors
    /// Any [`AgentError`]. The agent, if one was created, has been deleted (or
    /// deletion attempted) by the time this returns.
    pub async fn process_user_input(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResult, AgentError> {
        tracing::info!(question = %text, "Processing user input");

        let limit = self.timing.call_timeout;
        let usage = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            checked = tokio::time::timeout(limit, self.gate.check()) => {
                checked.unwrap_or_else(|_| Err(usage_timeout(limit)))?
            }
        };

        let contract = ToolContract::load(&self.contract_path).await?;
        let spec = AgentSpec {
            model: self.model.clone(),
            name: AGENT_NAME.to_string(),
            instructions: INSTRUCTIONS.to_string(),
            tools: contract.tool_definitions(),
        };

        let lease = self.create_agent(spec, cancel).await?;
        tracing::info!(agent_id = %lease.agent(), "Created agent");

        let outcome = self.drive(lease.agent(), text, cancel).await;
        lease.release().await;

        let transcript = outcome.map_err(|e| {
            tracing::error!("Orchestration failed: {}", e);
            e
        })?;

        let tool_calls = decode_steps(&transcript.steps);
        let answer_text = assemble(answer_message(&transcript.messages), &transcript.files);
        tracing::info!(
            tool_calls = tool_calls.len(),
            answer_len = answer_text.len(),
            "Answer assembled"
        );

        Ok(AgentResult {
            answer_text,
            usage,
            tool_calls,
        })
    }

    /// Create the agent on a separate task.
    ///
    /// Cancellation or the per-call timeout stops the wait, not the request:
    /// the creation task is handed to a follow-up task that deletes whatever
    /// agent the platform eventually returns.
    async fn create_agent(
        &self,
        spec: AgentSpec,
        cancel: &CancellationToken,
    ) -> Result<AgentLease, AgentError> {
        let limit = self.timing.call_timeout;
        let platform = Arc::clone(&self.platform);
        let mut creation = tokio::spawn(async move { platform.create_agent(&spec).await });

        let abandoned = tokio::select! {
            biased;
            _ = cancel.cancelled() => AgentError::Cancelled,
            joined = tokio::time::timeout(limit, &mut creation) => match joined {
                Ok(Ok(Ok(agent))) => {
                    return Ok(AgentLease::new(Arc::clone(&self.platform), agent, limit));
                }
                Ok(Ok(Err(e))) => return Err(AgentError::AgentCreationFailed(e)),
                Ok(Err(e)) => {
                    return Err(AgentError::AgentCreationFailed(PlatformError::network_error(
                        format!("agent creation task failed: {}", e),
                    )));
                }
                Err(_) => AgentError::AgentCreationFailed(PlatformError::timeout(limit)),
            },
        };

        tracing::warn!("Stopped waiting for agent creation: {}", abandoned);
        let platform = Arc::clone(&self.platform);
        tokio::spawn(async move {
            if let Ok(Ok(agent)) = creation.await {
                tracing::info!(agent_id = %agent, "Deleting agent created after its request ended");
                AgentLease::new(platform, agent, limit).release().await;
            }
        });
        Err(abandoned)
    }

    /// Everything between agent creation and cleanup.
    async fn drive(
        &self,
        agent: &AgentHandle,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, AgentError> {
        let thread = self
            .call(cancel, self.platform.create_thread())
            .await
            .map_err(|e| e.into_agent_error(AgentError::ThreadCreationFailed))?;
        tracing::debug!(agent_id = %agent, thread_id = %thread, "Created thread");

        self.call(
            cancel,
            self.platform.post_message(&thread, MessageRole::User, text),
        )
        .await
        .map_err(|e| e.into_agent_error(AgentError::MessageSendFailed))?;

        let run = self
            .call(cancel, self.platform.create_run(&thread, agent))
            .await
            .map_err(|e| e.into_agent_error(AgentError::RunCreationFailed))?;
        tracing::info!(thread_id = %thread, run_id = %run.id, "Run started");

        let (status, message) = self.wait_for_run(&thread, &run.id, cancel).await?;
        if status != RunStatus::Completed {
            return Err(AgentError::RunFailed { status, message });
        }

        let steps = self
            .call(cancel, self.platform.get_steps(&thread, &run.id))
            .await
            .map_err(|e| e.into_agent_error(AgentError::TranscriptUnavailable))?;
        let messages = self
            .call(cancel, self.platform.get_messages(&thread))
            .await
            .map_err(|e| e.into_agent_error(AgentError::TranscriptUnavailable))?;
        tracing::debug!(
            run_id = %run.id,
            steps = steps.len(),
            messages = messages.len(),
            "Fetched run transcript"
        );

        let files = self.fetch_images(&messages, cancel).await?;

        Ok(Transcript {
            steps,
            messages,
            files,
        })
    }

    /// Poll until the run leaves Queued/InProgress. Returns the terminal
    /// status and the remote error message, if any.
    async fn wait_for_run(
        &self,
        thread: &ThreadHandle,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(RunStatus, String), AgentError> {
        let deadline = Instant::now() + self.timing.run_timeout;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(run_id = %run_id, "Run polling cancelled");
                    return Err(AgentError::Cancelled);
                }
                _ = tokio::time::sleep(self.timing.poll_interval) => {}
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    run_id = %run_id,
                    "Run still pending after {:?}",
                    self.timing.run_timeout
                );
                return Err(AgentError::RunTimedOut(self.timing.run_timeout));
            }

            let run = self
                .call(cancel, self.platform.get_run(thread, run_id))
                .await
                .map_err(|e| e.into_agent_error(AgentError::RunPollFailed))?;

            if !run.status.is_pending() {
                tracing::info!(run_id = %run_id, status = %run.status, "Run reached terminal status");
                let message = run.last_error.map(|e| e.message).unwrap_or_default();
                return Ok((run.status, message));
            }
        }
    }

    /// Download the images referenced by the answer message. A file that
    /// cannot be fetched is left out of the answer.
    async fn fetch_images(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, RemoteFile>, AgentError> {
        let mut files = HashMap::new();
        let Some(answer) = answer_message(messages) else {
            return Ok(files);
        };

        for file_id in referenced_files(answer) {
            if files.contains_key(file_id) {
                continue;
            }
            match self.call(cancel, self.platform.get_file(file_id)).await {
                Ok(file) => {
                    files.insert(file_id.to_string(), file);
                }
                Err(CallError::Cancelled) => return Err(AgentError::Cancelled),
                Err(CallError::Remote(e)) => {
                    tracing::warn!(file_id = %file_id, "Skipping image: {}", e);
                }
                Err(CallError::TimedOut(limit)) => {
                    tracing::warn!(file_id = %file_id, "Skipping image, download exceeded {:?}", limit);
                }
            }
        }
        Ok(files)
    }

    /// Race one remote call against cancellation and the per-call timeout.
    async fn call<T, F>(&self, cancel: &CancellationToken, request: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        let limit = self.timing.call_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CallError::Cancelled),
            result = tokio::time::timeout(limit, request) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(CallError::Remote(e)),
                Err(_) => Err(CallError::TimedOut(limit)),
            },
        }
    }
}
