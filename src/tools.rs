//! Tool registry for the remote agent.
//!
//! The data tool is described by an OpenAPI contract read from disk on every
//! run and forwarded to the platform untouched; the code interpreter needs no
//! configuration.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;

use crate::platform::ToolDefinition;

/// Name the agent uses to call the data API.
pub const API_TOOL_NAME: &str = "fingertips_api_reduced";

/// Name recorded for code interpreter calls in the tool-call log.
pub const CODE_INTERPRETER_TOOL_NAME: &str = "code_interpreter";

const API_TOOL_DESCRIPTION: &str =
    "Access the Fingertips public health dataset API to retrieve health indicators and data";

#[derive(Debug, Error)]
#[error("Failed to read tool contract {path}: {source}")]
pub struct ToolContractError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Raw OpenAPI contract for the data tool.
#[derive(Debug, Clone)]
pub struct ToolContract {
    bytes: Bytes,
}

impl ToolContract {
    /// Read the contract file.
    ///
    /// # Errors
    /// Returns `ToolContractError` if the file is missing or unreadable.
    pub async fn load(path: &Path) -> Result<Self, ToolContractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ToolContractError {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("Loaded tool contract {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            bytes: Bytes::from(bytes),
        })
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Tool set handed to every agent: the data API plus code execution.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::OpenApi {
                name: API_TOOL_NAME.to_string(),
                description: API_TOOL_DESCRIPTION.to_string(),
                spec: self.bytes.clone(),
            },
            ToolDefinition::CodeInterpreter,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_reads_contract_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"openapi":"3.0.1"}"#).unwrap();

        let contract = ToolContract::load(file.path()).await.unwrap();
        assert_eq!(contract.as_bytes(), br#"{"openapi":"3.0.1"}"#);
    }

    #[tokio::test]
    async fn test_missing_contract_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = ToolContract::load(&path).await.unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.source.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_tool_definitions_include_both_tools() {
        let contract = ToolContract::from_bytes(&b"{}"[..]);
        let tools = contract.tool_definitions();
        assert_eq!(tools.len(), 2);
        assert!(matches!(
            &tools[0],
            ToolDefinition::OpenApi { name, spec, .. } if name == API_TOOL_NAME && spec.as_ref() == b"{}"
        ));
        assert_eq!(tools[1], ToolDefinition::CodeInterpreter);
    }
}
