//! Step decoder - turns a run's step history into a uniform tool-call log.
//!
//! Step details arrive as loosely typed JSON whose shape depends on a `type`
//! discriminator. Each invocation is first classified into [`ToolInvocation`],
//! then normalized into a [`ToolCall`]. A step that cannot be normalized is
//! logged and dropped; the rest of the log is kept.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StepDecodeError;
use crate::platform::StepRecord;
use crate::tools::CODE_INTERPRETER_TOOL_NAME;

/// One tool invocation made by the agent, normalized across tool kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: BTreeMap<String, String>,
    /// Verbatim tool output; empty for tools without synchronous textual output.
    pub output: String,
}

/// Classified tool invocation as recorded by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// REST API call (`openapi`) or function call (`function`).
    Api {
        name: String,
        arguments: Value,
        output: Option<Value>,
    },
    CodeInterpreter { input: String },
    Unrecognized { kind: String },
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    openapi: Option<RawFunction>,
    #[serde(default)]
    function: Option<RawFunction>,
    #[serde(default)]
    code_interpreter: Option<RawCodeInterpreter>,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    output: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCodeInterpreter {
    #[serde(default)]
    input: String,
}

impl ToolInvocation {
    fn classify(raw: RawToolCall) -> Self {
        match raw.kind.as_str() {
            "openapi" | "function" => match raw.openapi.or(raw.function) {
                Some(f) => ToolInvocation::Api {
                    name: f.name,
                    arguments: f.arguments,
                    output: f.output,
                },
                None => ToolInvocation::Unrecognized {
                    kind: raw.kind.clone(),
                },
            },
            "code_interpreter" => ToolInvocation::CodeInterpreter {
                input: raw.code_interpreter.map(|c| c.input).unwrap_or_default(),
            },
            _ => ToolInvocation::Unrecognized {
                kind: raw.kind.clone(),
            },
        }
    }

    fn into_tool_call(self, step_id: &str) -> Result<ToolCall, StepDecodeError> {
        match self {
            ToolInvocation::Api {
                name,
                arguments,
                output,
            } => Ok(ToolCall {
                tool_name: name,
                arguments: flatten_arguments(arguments).map_err(|reason| {
                    StepDecodeError::Malformed {
                        step_id: step_id.to_string(),
                        reason,
                    }
                })?,
                output: match output {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                },
            }),
            ToolInvocation::CodeInterpreter { input } => Ok(ToolCall {
                tool_name: CODE_INTERPRETER_TOOL_NAME.to_string(),
                arguments: BTreeMap::from([("code".to_string(), input)]),
                output: String::new(),
            }),
            ToolInvocation::Unrecognized { kind } => Err(StepDecodeError::UnrecognizedToolKind {
                step_id: step_id.to_string(),
                kind,
            }),
        }
    }
}

/// Arguments arrive either as a JSON-encoded string or as an inline object.
fn flatten_arguments(arguments: Value) -> Result<BTreeMap<String, String>, String> {
    let object = match arguments {
        Value::Null => return Ok(BTreeMap::new()),
        Value::String(s) if s.trim().is_empty() => return Ok(BTreeMap::new()),
        Value::String(s) => serde_json::from_str::<Value>(&s)
            .map_err(|e| format!("arguments are not valid JSON: {}", e))?,
        other => other,
    };

    match object {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(value)))
            .collect()),
        other => Err(format!("arguments are not an object: {}", other)),
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode one step into its tool calls.
///
/// Steps that are not tool invocations decode to an empty list.
pub fn decode_step(step: &StepRecord) -> Result<Vec<ToolCall>, StepDecodeError> {
    if step.details.get("type").and_then(Value::as_str) != Some("tool_calls") {
        return Ok(Vec::new());
    }

    let raw_calls = match step.details.get("tool_calls") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(calls) => Vec::<RawToolCall>::deserialize(calls).map_err(|e| {
            StepDecodeError::Malformed {
                step_id: step.id.clone(),
                reason: e.to_string(),
            }
        })?,
    };

    raw_calls
        .into_iter()
        .map(|raw| ToolInvocation::classify(raw).into_tool_call(&step.id))
        .collect()
}

/// Decode an oldest-first step list into a chronological tool-call log.
pub fn decode_steps(steps: &[StepRecord]) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for step in steps {
        match decode_step(step) {
            Ok(decoded) => calls.extend(decoded),
            Err(e) => tracing::warn!("Skipping undecodable step: {}", e),
        }
    }
    calls
}
