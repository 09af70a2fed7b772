//! Scoped ownership of a remote agent.
//!
//! An [`AgentLease`] is created the moment the platform returns an agent and
//! must be released on every exit path. `release` is the normal path; if the
//! lease is dropped unreleased (the owning future was dropped mid-flight),
//! deletion is scheduled on the runtime instead.

use std::sync::Arc;
use std::time::Duration;

use crate::platform::{AgentHandle, AgentPlatform};

pub struct AgentLease {
    platform: Arc<dyn AgentPlatform>,
    agent: AgentHandle,
    call_timeout: Duration,
    released: bool,
}

impl AgentLease {
    pub fn new(platform: Arc<dyn AgentPlatform>, agent: AgentHandle, call_timeout: Duration) -> Self {
        Self {
            platform,
            agent,
            call_timeout,
            released: false,
        }
    }

    pub fn agent(&self) -> &AgentHandle {
        &self.agent
    }

    /// Delete the agent. Failures are logged and swallowed so they never mask
    /// the outcome of the work done under the lease.
    pub async fn release(mut self) {
        delete_agent(
            Arc::clone(&self.platform),
            self.agent.clone(),
            self.call_timeout,
        )
        .await;
        self.released = true;
    }
}

impl Drop for AgentLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let platform = Arc::clone(&self.platform);
        let agent = self.agent.clone();
        let call_timeout = self.call_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(agent_id = %agent, "Agent lease dropped unreleased, scheduling deletion");
                handle.spawn(delete_agent(platform, agent, call_timeout));
            }
            Err(_) => {
                tracing::error!(agent_id = %agent, "Agent lease dropped outside a runtime, agent leaked");
            }
        }
    }
}

async fn delete_agent(platform: Arc<dyn AgentPlatform>, agent: AgentHandle, call_timeout: Duration) {
    match tokio::time::timeout(call_timeout, platform.delete_agent(&agent)).await {
        Ok(Ok(())) => tracing::debug!(agent_id = %agent, "Deleted agent"),
        Ok(Err(e)) => tracing::warn!(agent_id = %agent, "Failed to delete agent: {}", e),
        Err(_) => tracing::warn!(
            agent_id = %agent,
            "Agent deletion timed out after {:?}",
            call_timeout
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::testing::RecordingPlatform;

    #[tokio::test]
    async fn test_release_deletes_once() {
        let platform = Arc::new(RecordingPlatform::completing());
        let lease = AgentLease::new(platform.clone(), AgentHandle::new("asst_1"), Duration::from_secs(1));

        lease.release().await;

        assert_eq!(platform.deleted_agents(), vec![AgentHandle::new("asst_1")]);
    }

    #[tokio::test]
    async fn test_failed_delete_is_swallowed() {
        let platform = Arc::new(RecordingPlatform::completing().failing_delete());
        let lease = AgentLease::new(platform.clone(), AgentHandle::new("asst_1"), Duration::from_secs(1));

        lease.release().await;

        assert_eq!(platform.deleted_agents().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_schedules_deletion() {
        let platform = Arc::new(RecordingPlatform::completing());
        {
            let _lease =
                AgentLease::new(platform.clone(), AgentHandle::new("asst_2"), Duration::from_secs(1));
        }

        // Let the spawned deletion run.
        for _ in 0..10 {
            if !platform.deleted_agents().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(platform.deleted_agents(), vec![AgentHandle::new("asst_2")]);
    }
}
