// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP types for tool discovery and tool results.
//!
//! Wire payloads are converted here so the rest of the module deals only
//! in typed values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Information about a tool discovered on an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolInfo {
    /// Tool name as reported by the server.
    pub name: String,

    /// Tool description.
    pub description: Option<String>,

    /// JSON Schema for tool input.
    pub input_schema: Value,

    /// Server this tool belongs to.
    pub server: String,

    /// Whether the tool is destructive (writes files, runs commands, etc.).
    #[serde(default)]
    pub destructive: bool,

    /// Whether the tool is read-only.
    #[serde(default)]
    pub read_only: bool,

    /// Whether the tool is idempotent (safe to retry).
    #[serde(default)]
    pub idempotent: bool,
}

impl McpToolInfo {
    /// Parse one entry of a `tools/list` result, tagging it with `server`.
    ///
    /// Returns `None` for entries without a name.
    pub fn from_wire(tool: &Value, server: &str) -> Option<Self> {
        let Some(name) = tool.get("name").and_then(Value::as_str) else {
            warn!(server = %server, tool = %tool, "Skipping tool without a name");
            return None;
        };
        let name = name.to_string();
        let hint = |key: &str| {
            tool.get("annotations")
                .and_then(|a| a.get(key))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };

        Some(Self {
            name,
            description: tool
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            input_schema: tool
                .get("inputSchema")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({ "type": "object" })),
            server: server.to_string(),
            destructive: hint("destructiveHint"),
            read_only: hint("readOnlyHint"),
            idempotent: hint("idempotentHint"),
        })
    }

    /// Get the qualified tool name (`mcp__server__tool`).
    pub fn qualified_name(&self) -> String {
        format!("mcp__{}__{}", self.server, self.name)
    }
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolResult {
    /// Result content (text, images, etc.).
    pub content: Vec<McpContent>,

    /// Whether the server flagged the call as failed.
    #[serde(default)]
    pub is_error: bool,
}

impl McpToolResult {
    /// Create a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Parse a `tools/call` result.
    pub fn from_wire(result: &Value) -> Self {
        let content = result
            .get("content")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(McpContent::from_wire).collect())
            .unwrap_or_default();

        Self {
            content,
            is_error: result
                .get("isError")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }

    /// Get the text content as a single string.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                McpContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content types that can be returned by MCP tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// Plain text content.
    Text {
        /// The text content.
        text: String,
    },

    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        mime_type: String,
    },

    /// Resource reference.
    Resource {
        /// URI of the resource.
        uri: String,
        /// Optional MIME type.
        mime_type: Option<String>,
        /// Optional text content.
        text: Option<String>,
    },
}

impl McpContent {
    /// Parse one content item; unknown kinds are dropped.
    pub fn from_wire(item: &Value) -> Option<Self> {
        let str_field = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(String::from);

        match item.get("type")?.as_str()? {
            "text" => Some(Self::Text {
                text: str_field(item, "text")?,
            }),
            "image" => Some(Self::Image {
                data: str_field(item, "data")?,
                mime_type: str_field(item, "mimeType")?,
            }),
            "resource" => {
                let resource = item.get("resource")?;
                Some(Self::Resource {
                    uri: str_field(resource, "uri")?,
                    mime_type: str_field(resource, "mimeType"),
                    text: str_field(resource, "text"),
                })
            }
            _ => None,
        }
    }
}

/// Server information reported during initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,

    /// Server version.
    pub version: String,

    /// Protocol version the server agreed to.
    #[serde(default)]
    pub protocol_version: Option<String>,

    /// Raw capabilities object.
    #[serde(default)]
    pub capabilities: Value,
}

impl ServerInfo {
    /// Parse an `initialize` result.
    pub fn from_wire(result: &Value) -> Self {
        let info = result.get("serverInfo");
        let field = |key: &str, default: &str| {
            info.and_then(|s| s.get(key))
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        Self {
            name: field("name", "unknown"),
            version: field("version", "0.0.0"),
            protocol_version: result
                .get("protocolVersion")
                .and_then(Value::as_str)
                .map(String::from),
            capabilities: result.get("capabilities").cloned().unwrap_or(Value::Null),
        }
    }

    /// Whether the server advertises the tools capability.
    ///
    /// Servers that omit capabilities entirely are given the benefit of the doubt.
    pub fn supports_tools(&self) -> bool {
        match &self.capabilities {
            Value::Object(caps) => caps.contains_key("tools"),
            _ => true,
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            version: "0.0.0".to_string(),
            protocol_version: None,
            capabilities: Value::Null,
        }
    }
}

/// Lifecycle state of one server entry.
///
/// `Configured → Resolved → {Opened | Skipped | Failed}`, then `Opened → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Descriptor read, nothing resolved yet.
    #[default]
    Configured,

    /// Indirections resolved, transport constructed.
    Resolved,

    /// Connection open and initialized.
    Opened,

    /// Entry excluded by configuration.
    Skipped,

    /// Open attempt failed.
    Failed,

    /// Connection released.
    Closed,
}

impl ConnectionState {
    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Failed | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configured => write!(f, "configured"),
            Self::Resolved => write!(f, "resolved"),
            Self::Opened => write!(f, "opened"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_from_wire() {
        let wire = json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": { "type": "object", "properties": { "path": { "type": "string" } } },
            "annotations": { "readOnlyHint": true, "idempotentHint": true }
        });
        let tool = McpToolInfo::from_wire(&wire, "filesystem").unwrap();
        assert_eq!(tool.name, "read_file");
        assert_eq!(tool.server, "filesystem");
        assert!(tool.read_only);
        assert!(tool.idempotent);
        assert!(!tool.destructive);
        assert_eq!(tool.qualified_name(), "mcp__filesystem__read_file");
    }

    #[test]
    fn test_tool_from_wire_requires_name() {
        assert!(McpToolInfo::from_wire(&json!({ "description": "x" }), "s").is_none());
        let tool = McpToolInfo::from_wire(&json!({ "name": "bare" }), "s").unwrap();
        assert_eq!(tool.input_schema, json!({ "type": "object" }));
    }

    #[test]
    fn test_tool_result_from_wire() {
        let wire = json!({
            "content": [
                { "type": "text", "text": "line one" },
                { "type": "image", "data": "aGk=", "mimeType": "image/png" },
                { "type": "audio", "data": "..." },
                { "type": "text", "text": "line two" }
            ],
            "isError": false
        });
        let result = McpToolResult::from_wire(&wire);
        assert_eq!(result.content.len(), 3);
        assert!(!result.is_error);
        assert_eq!(result.as_text(), "line one\nline two");
    }

    #[test]
    fn test_tool_result_constructors() {
        assert!(!McpToolResult::text("ok").is_error);
        let err = McpToolResult::error("Something went wrong");
        assert!(err.is_error);
        assert_eq!(err.as_text(), "Something went wrong");
    }

    #[test]
    fn test_server_info_from_wire() {
        let info = ServerInfo::from_wire(&json!({
            "protocolVersion": "2025-03-26",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "time", "version": "1.2.0" }
        }));
        assert_eq!(info.name, "time");
        assert_eq!(info.version, "1.2.0");
        assert_eq!(info.protocol_version.as_deref(), Some("2025-03-26"));
        assert!(info.supports_tools());

        let info = ServerInfo::from_wire(&json!({ "capabilities": { "prompts": {} } }));
        assert_eq!(info.name, "unknown");
        assert!(!info.supports_tools());
    }

    #[test]
    fn test_connection_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Configured);
        assert_eq!(ConnectionState::Opened.to_string(), "opened");
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Opened.is_terminal());
    }
}
