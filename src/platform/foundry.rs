//! Azure AI Foundry agents REST client with automatic retry for transient read errors.
//!
//! Create/post/delete calls are sent once: remote state may already exist when
//! they fail, so a blind retry could duplicate it.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::future::Future;
use std::time::{Duration, Instant};

use super::error::{PlatformError, RetryConfig};
use super::{
    AgentHandle, AgentPlatform, AgentSpec, Message, MessageRole, RemoteFile, RunHandle,
    StepRecord, ThreadHandle, ToolDefinition,
};
use crate::config::PlatformConfig;

const PAGE_LIMIT: u32 = 100;

/// Agents API client authenticated with an injected bearer token.
pub struct FoundryClient {
    client: Client,
    endpoint: String,
    api_version: String,
    token: String,
    retry_config: RetryConfig,
}

impl FoundryClient {
    /// Create a new client with default retry configuration.
    pub fn new(config: &PlatformConfig) -> Self {
        Self::with_retry_config(config, RetryConfig::default())
    }

    /// Create a new client with custom retry configuration.
    pub fn with_retry_config(config: &PlatformConfig, retry_config: RetryConfig) -> Self {
        let mut endpoint = config.endpoint.clone();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            client: Client::new(),
            endpoint,
            api_version: config.api_version.clone(),
            token: config.token.clone(),
            retry_config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, path, self.api_version)
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    fn transport_error(e: reqwest::Error) -> PlatformError {
        if e.is_timeout() {
            PlatformError::network_error(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            PlatformError::network_error(format!("Connection failed: {}", e))
        } else {
            PlatformError::network_error(format!("Request failed: {}", e))
        }
    }

    /// Execute a single request, turning non-2xx statuses into classified errors.
    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response, PlatformError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = Self::parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status.as_u16(), &body, retry_after));
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PlatformError> {
        let body = self
            .execute(request)
            .await?
            .text()
            .await
            .map_err(Self::transport_error)?;
        serde_json::from_str(&body).map_err(|e| {
            PlatformError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })
    }

    /// Run an idempotent read with automatic retry for transient errors.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(
                            "{} succeeded after {} retries (total time: {:?})",
                            operation,
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.retry_config.should_retry(&error, attempt) {
                        if attempt > 0 {
                            tracing::error!(
                                "{} failed after {} retries (total time: {:?}): {}",
                                operation,
                                attempt,
                                start.elapsed(),
                                error
                            );
                        }
                        return Err(error);
                    }

                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let delay = error.suggested_delay(attempt).min(remaining);
                    if delay.is_zero() {
                        tracing::warn!("{} failed, no retry time remaining: {}", operation, error);
                        return Err(error);
                    }

                    tracing::warn!(
                        "{} attempt {} failed with {}, retrying in {:?}: {}",
                        operation,
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Fetch every page of a cursor-paginated list.
    async fn list_all<T>(&self, path: &str, order: &str) -> Result<Vec<T>, PlatformError>
    where
        T: DeserializeOwned + HasId,
    {
        let mut items: Vec<T> = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut url = format!("{}&order={}&limit={}", self.url(path), order, PAGE_LIMIT);
            if let Some(cursor) = after.as_deref() {
                url.push_str("&after=");
                url.push_str(&urlencoding::encode(cursor));
            }

            let page: ListPage<T> = self
                .with_retry(path, || self.execute_json(self.client.get(&url)))
                .await?;

            let last_id = page.data.last().map(|item| item.id().to_string());
            items.extend(page.data);

            match (page.has_more, last_id) {
                (true, Some(id)) => after = Some(id),
                _ => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl AgentPlatform for FoundryClient {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle, PlatformError> {
        let tools = spec
            .tools
            .iter()
            .map(WireTool::from_definition)
            .collect::<Result<Vec<_>, _>>()?;
        let request = CreateAgentRequest {
            model: &spec.model,
            name: &spec.name,
            instructions: &spec.instructions,
            tools,
        };

        tracing::debug!("Creating agent: model={}, name={}", spec.model, spec.name);
        let created: IdOnly = self
            .execute_json(self.client.post(self.url("/assistants")).json(&request))
            .await?;
        Ok(AgentHandle::new(created.id))
    }

    async fn create_thread(&self) -> Result<ThreadHandle, PlatformError> {
        let created: IdOnly = self
            .execute_json(
                self.client
                    .post(self.url("/threads"))
                    .json(&serde_json::json!({})),
            )
            .await?;
        Ok(ThreadHandle::new(created.id))
    }

    async fn post_message(
        &self,
        thread: &ThreadHandle,
        role: MessageRole,
        text: &str,
    ) -> Result<(), PlatformError> {
        let path = format!("/threads/{}/messages", thread.id());
        let _: IdOnly = self
            .execute_json(
                self.client
                    .post(self.url(&path))
                    .json(&serde_json::json!({ "role": role, "content": text })),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread: &ThreadHandle,
        agent: &AgentHandle,
    ) -> Result<RunHandle, PlatformError> {
        let path = format!("/threads/{}/runs", thread.id());
        self.execute_json(
            self.client
                .post(self.url(&path))
                .json(&serde_json::json!({ "assistant_id": agent.id() })),
        )
        .await
    }

    async fn get_run(&self, thread: &ThreadHandle, run_id: &str) -> Result<RunHandle, PlatformError> {
        let url = self.url(&format!("/threads/{}/runs/{}", thread.id(), run_id));
        self.with_retry("get_run", || self.execute_json(self.client.get(&url)))
            .await
    }

    async fn get_steps(
        &self,
        thread: &ThreadHandle,
        run_id: &str,
    ) -> Result<Vec<StepRecord>, PlatformError> {
        let path = format!("/threads/{}/runs/{}/steps", thread.id(), run_id);
        self.list_all(&path, "asc").await
    }

    async fn get_messages(&self, thread: &ThreadHandle) -> Result<Vec<Message>, PlatformError> {
        let path = format!("/threads/{}/messages", thread.id());
        self.list_all(&path, "desc").await
    }

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile, PlatformError> {
        let info_url = self.url(&format!("/files/{}", file_id));
        let info: FileInfo = self
            .with_retry("get_file", || self.execute_json(self.client.get(&info_url)))
            .await?;

        let content_url = self.url(&format!("/files/{}/content", file_id));
        let this = self;
        let url = content_url.as_str();
        let bytes = self
            .with_retry("get_file_content", move || async move {
                this.execute(this.client.get(url))
                    .await?
                    .bytes()
                    .await
                    .map_err(Self::transport_error)
            })
            .await?;

        Ok(RemoteFile {
            filename: info.filename,
            bytes,
        })
    }

    async fn delete_agent(&self, agent: &AgentHandle) -> Result<(), PlatformError> {
        let path = format!("/assistants/{}", agent.id());
        self.execute(self.client.delete(self.url(&path))).await?;
        Ok(())
    }
}

trait HasId {
    fn id(&self) -> &str;
}

impl HasId for StepRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl HasId for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Agent creation request body.
#[derive(Serialize)]
struct CreateAgentRequest<'a> {
    model: &'a str,
    name: &'a str,
    instructions: &'a str,
    tools: Vec<WireTool<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireTool<'a> {
    Openapi { openapi: WireOpenApi<'a> },
    CodeInterpreter,
}

#[derive(Serialize)]
struct WireOpenApi<'a> {
    name: &'a str,
    description: &'a str,
    spec: &'a RawValue,
    auth: WireAuth,
}

#[derive(Serialize)]
struct WireAuth {
    #[serde(rename = "type")]
    auth_type: &'static str,
}

impl<'a> WireTool<'a> {
    /// The contract bytes are forwarded as-is; only their JSON framing is checked.
    fn from_definition(tool: &'a ToolDefinition) -> Result<Self, PlatformError> {
        match tool {
            ToolDefinition::OpenApi {
                name,
                description,
                spec,
            } => {
                let spec: &RawValue = serde_json::from_slice(spec).map_err(|e| {
                    PlatformError::parse_error(format!("Tool contract is not valid JSON: {}", e))
                })?;
                Ok(WireTool::Openapi {
                    openapi: WireOpenApi {
                        name,
                        description,
                        spec,
                        auth: WireAuth {
                            auth_type: "anonymous",
                        },
                    },
                })
            }
            ToolDefinition::CodeInterpreter => Ok(WireTool::CodeInterpreter),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    filename: String,
}

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn client() -> FoundryClient {
        FoundryClient::new(&PlatformConfig {
            endpoint: "https://example.services.ai.azure.com/api/projects/demo/".to_string(),
            token: "token".to_string(),
            api_version: "v1".to_string(),
            model_deployment: "gpt-4o".to_string(),
        })
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        assert_eq!(
            client().url("/threads"),
            "https://example.services.ai.azure.com/api/projects/demo/threads?api-version=v1"
        );
    }

    #[test]
    fn test_tools_serialize_to_wire_shape() {
        let tools = vec![
            ToolDefinition::OpenApi {
                name: "fingertips_api_reduced".to_string(),
                description: "Fingertips".to_string(),
                spec: Bytes::from_static(br#"{"openapi":"3.0.1","paths":{}}"#),
            },
            ToolDefinition::CodeInterpreter,
        ];
        let wire = tools
            .iter()
            .map(WireTool::from_definition)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {
                    "type": "openapi",
                    "openapi": {
                        "name": "fingertips_api_reduced",
                        "description": "Fingertips",
                        "spec": {"openapi": "3.0.1", "paths": {}},
                        "auth": {"type": "anonymous"}
                    }
                },
                {"type": "code_interpreter"}
            ])
        );
    }

    #[test]
    fn test_invalid_contract_is_parse_error() {
        let tool = ToolDefinition::OpenApi {
            name: "x".to_string(),
            description: "x".to_string(),
            spec: Bytes::from_static(b"not json"),
        };
        let err = WireTool::from_definition(&tool).err().unwrap();
        assert_eq!(err.kind, crate::platform::PlatformErrorKind::ParseError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_error() {
        let client = client();
        let mut calls = 0;
        let result = client
            .with_retry("probe", || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        Err(PlatformError::server_error(503, "busy".to_string()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_error() {
        let client = client();
        let mut calls = 0;
        let result: Result<(), _> = client
            .with_retry("probe", || {
                calls += 1;
                async { Err(PlatformError::client_error(404, "gone".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
