//! Remote tool-calling (MCP over HTTP) integrations.
//!
//! Layers, leaf-first:
//! - `client`: the transport, which connects to an endpoint and invokes a named tool.
//! - `tracker` / `gateway`: closed operation sets bound to one session each.
//! - `service`: the facade that lazily connects both adapters exactly once.
//! - `handlers`: the `/api/mcp` route.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod client;
pub mod gateway;
pub mod handlers;
pub mod service;
pub mod tracker;

/// Errors raised anywhere along the tool-invocation path.
#[derive(Debug, Error)]
pub enum McpError {
    /// Session establishment failed: unreachable endpoint, rejected credential,
    /// or a malformed handshake. No session is produced.
    #[error("failed to connect to {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    /// The endpoint rejected the call or could not be reached mid-session.
    /// `payload` carries the endpoint's own error object when it sent one.
    #[error("tool '{tool}' failed: {message}")]
    Invocation {
        tool: String,
        message: String,
        payload: Option<Value>,
    },

    /// Arguments failed local validation and were never sent.
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl McpError {
    pub(crate) fn connection(endpoint: &str, message: impl Into<String>) -> Self {
        McpError::Connection {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        McpError::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// One named tool call. Built per request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

/// A single item of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// The canonical result of every adapter operation. `content` is ordered and
/// may hold more than one part.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ToolResult {
    /// All `text` parts joined by newlines, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|p| p.kind == "text")
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Serializes typed operation params into the JSON object sent as `arguments`.
pub(crate) fn to_arguments<T: Serialize>(
    tool: &str,
    params: &T,
) -> Result<Map<String, Value>, McpError> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(McpError::invalid(
            tool,
            format!("expected an object, got {other}"),
        )),
        Err(e) => Err(McpError::invalid(tool, e.to_string())),
    }
}

/// Rejects blank required identifiers.
pub(crate) fn require_non_blank(tool: &str, field: &str, value: &str) -> Result<(), McpError> {
    if value.trim().is_empty() {
        return Err(McpError::invalid(tool, format!("'{field}' is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_text_joins_text_parts_in_order() {
        let result: ToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "text": ""},
                {"type": "text", "text": "second"}
            ]
        }))
        .unwrap();
        assert_eq!(result.content.len(), 3);
        assert_eq!(result.text(), "first\nsecond");
    }

    #[test]
    fn test_content_part_serializes_kind_as_type() {
        let part = ContentPart {
            kind: "text".to_string(),
            text: "hello".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"type": "text", "text": "hello"})
        );
    }

    #[test]
    fn test_require_non_blank_rejects_whitespace() {
        let err = require_non_blank("get_task", "task_id", "   ").unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments { .. }));
        assert!(err.to_string().contains("task_id"));
    }
}
