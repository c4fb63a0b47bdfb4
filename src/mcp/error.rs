// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP error types.

use thiserror::Error;

/// Errors that can occur during MCP operations.
///
/// None of these escape a batch open: the lifecycle layer classifies them
/// per server into skipped or failed outcomes.
#[derive(Debug, Error)]
pub enum McpError {
    /// Required descriptor field missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport name outside the supported set.
    #[error("Unsupported transport '{transport}' (supported: {supported})")]
    UnsupportedTransport { transport: String, supported: String },

    /// Server disabled in configuration.
    #[error("MCP server '{0}' is disabled")]
    Disabled(String),

    /// Spawn or connect failed.
    #[error("Failed to connect to MCP server '{server}': {message}")]
    ConnectionFailed { server: String, message: String },

    /// Open or discovery did not complete in time.
    #[error("MCP server '{server}' timed out after {timeout_secs}s during {operation}")]
    Timeout {
        server: String,
        operation: &'static str,
        timeout_secs: u64,
    },

    /// Initialization handshake failed.
    #[error("Failed to initialize MCP server '{server}': {message}")]
    InitializationFailed { server: String, message: String },

    /// Tool listing failed.
    #[error("Failed to list tools on MCP server '{server}': {message}")]
    ToolListFailed { server: String, message: String },

    /// Tool call failed.
    #[error("Tool call '{tool}' failed: {message}")]
    ToolCallFailed { tool: String, message: String },

    /// Tool not present in the registry.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Handle is not open.
    #[error("MCP server '{0}' is not ready")]
    NotReady(String),

    /// The lifecycle group was closed and cannot open new connections.
    #[error("MCP lifecycle manager is closed")]
    LifecycleClosed,

    /// A tool call was still running when its connection was closed.
    #[error("Tool call '{0}' interrupted: its connection was closed")]
    Interrupted(String),

    /// A registry outlived the connections it was built from.
    #[error("Tool registry is stale; its connections were replaced or closed")]
    StaleRegistry,

    /// Invalid response from server.
    #[error("Invalid response from MCP server: {0}")]
    InvalidResponse(String),

    /// Protocol error (JSON-RPC).
    #[error("Protocol error: code={code}, message={message}")]
    Protocol { code: i64, message: String },

    /// Transport error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Create a connection failed error.
    pub fn connection_failed(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create an initialization failed error.
    pub fn init_failed(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a tool listing error.
    pub fn tool_list_failed(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolListFailed {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Create a tool call failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolCallFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self::Protocol {
            code,
            message: message.into(),
        }
    }

    /// Whether this error means the entry should be skipped rather than
    /// counted as a failed connection.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnsupportedTransport { .. } | Self::Disabled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = McpError::UnsupportedTransport {
            transport: "foo".to_string(),
            supported: "stdio, sse".to_string(),
        };
        assert!(err.to_string().contains("foo"));
        assert!(err.to_string().contains("stdio, sse"));

        let err = McpError::protocol(-32600, "Invalid Request");
        assert!(err.to_string().contains("-32600"));
        assert!(err.to_string().contains("Invalid Request"));

        let err = McpError::Timeout {
            server: "slow".to_string(),
            operation: "open",
            timeout_secs: 5,
        };
        assert!(err.to_string().contains("slow"));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_skip_classification() {
        assert!(McpError::Config("missing url".to_string()).is_skip());
        assert!(McpError::Disabled("x".to_string()).is_skip());
        assert!(!McpError::connection_failed("server", "connection refused").is_skip());
        assert!(!McpError::init_failed("server", "handshake failed").is_skip());
    }

    #[test]
    fn test_error_helpers() {
        let err = McpError::connection_failed("server", "connection refused");
        assert!(matches!(err, McpError::ConnectionFailed { .. }));

        let err = McpError::tool_list_failed("server", "boom");
        assert!(matches!(err, McpError::ToolListFailed { .. }));

        let err = McpError::tool_failed("read_file", "file not found");
        assert!(matches!(err, McpError::ToolCallFailed { .. }));
    }
}
