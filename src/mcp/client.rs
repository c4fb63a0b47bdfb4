// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP client handle.
//!
//! A [`ClientHandle`] owns one transport and adds the protocol layer on top:
//! the initialize handshake, paginated tool discovery, and tool calls. Every
//! network-facing step runs under the server's configured timeout.

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::config::{ToolFilter, TransportKind};
use super::error::McpError;
use super::transport::Transport;
use super::types::{ConnectionState, McpToolInfo, McpToolResult, ServerInfo};

#[cfg(feature = "telemetry")]
use std::time::Instant;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Protocol revision requested during initialization.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Upper bound on `tools/list` pages, in case a server keeps returning cursors.
const MAX_TOOL_PAGES: usize = 100;

/// Client for a single MCP server connection.
pub struct ClientHandle {
    /// Server name.
    name: String,

    /// Underlying transport.
    transport: Box<dyn Transport>,

    /// Lifecycle state.
    state: ConnectionState,

    /// Server info (after initialization).
    server_info: Option<ServerInfo>,

    /// Limit for open and discovery.
    timeout: Duration,

    /// Limit for a single tool call.
    tool_timeout: Duration,

    /// Which discovered tools are exposed.
    filter: ToolFilter,
}

impl ClientHandle {
    /// Wrap a constructed transport. The handle starts out `Resolved`.
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            transport,
            state: ConnectionState::Resolved,
            server_info: None,
            timeout: Duration::from_secs(30),
            tool_timeout: Duration::from_secs(300),
            filter: ToolFilter::default(),
        }
    }

    /// Set the open/discovery timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the tool call timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Set the tool filter.
    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport kind.
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get server info (if available).
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Check if the handle is open.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Opened
    }

    async fn with_timeout_of<T, F>(
        name: &str,
        limit: Duration,
        operation: &'static str,
        fut: F,
    ) -> Result<T, McpError>
    where
        F: Future<Output = Result<T, McpError>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| McpError::Timeout {
                server: name.to_string(),
                operation,
                timeout_secs: limit.as_secs(),
            })?
    }

    /// Open the connection and run the initialize handshake.
    ///
    /// On failure the transport is released and the handle is `Failed`.
    pub async fn open(&mut self) -> Result<ServerInfo, McpError> {
        if let (ConnectionState::Opened, Some(info)) = (self.state, &self.server_info) {
            return Ok(info.clone());
        }

        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let server = self.name.clone();
        let transport = &mut self.transport;
        let result = Self::with_timeout_of(&self.name, self.timeout, "open", async move {
            transport.connect().await?;
            let init = transport
                .request(
                    "initialize",
                    Some(json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {},
                        "clientInfo": {
                            "name": "agentcli",
                            "version": crate::VERSION
                        }
                    })),
                )
                .await
                .map_err(|e| match e {
                    McpError::ConnectionFailed { .. } => e,
                    other => McpError::init_failed(&server, other.to_string()),
                })?;
            transport.notify("notifications/initialized", None).await?;
            Ok(ServerInfo::from_wire(&init))
        })
        .await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.open", start.elapsed());

        match result {
            Ok(info) => {
                info!(
                    server = %self.name,
                    transport = %self.kind(),
                    remote = %info.name,
                    version = %info.version,
                    "MCP server opened"
                );
                self.state = ConnectionState::Opened;
                self.server_info = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                self.transport.close().await;
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// List the server's tools, following pagination cursors.
    ///
    /// Tools come back in server order, tagged with this handle's name and
    /// filtered by the configured enabled/disabled lists.
    pub async fn list_tools(&mut self) -> Result<Vec<McpToolInfo>, McpError> {
        if !self.is_open() {
            return Err(McpError::NotReady(self.name.clone()));
        }

        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let server = self.name.clone();
        let transport = &mut self.transport;
        let result = Self::with_timeout_of(&self.name, self.timeout, "list_tools", async move {
            let mut raw = Vec::new();
            let mut cursor: Option<String> = None;

            for _ in 0..MAX_TOOL_PAGES {
                let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
                let page = transport
                    .request("tools/list", params)
                    .await
                    .map_err(|e| McpError::tool_list_failed(&server, e.to_string()))?;

                let tools = page
                    .get("tools")
                    .and_then(Value::as_array)
                    .ok_or_else(|| McpError::tool_list_failed(&server, "result has no tools array"))?;
                raw.extend(tools.iter().cloned());

                cursor = page
                    .get("nextCursor")
                    .and_then(Value::as_str)
                    .map(String::from);
                if cursor.is_none() {
                    break;
                }
            }

            Ok(raw)
        })
        .await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("mcp.list_tools", start.elapsed());

        let tools: Vec<McpToolInfo> = result?
            .iter()
            .filter_map(|t| McpToolInfo::from_wire(t, &self.name))
            .filter(|t| self.filter.allows(&t.name))
            .collect();

        debug!(server = %self.name, count = tools.len(), "Discovered tools");
        Ok(tools)
    }

    /// Call a tool on this server.
    pub async fn call_tool(
        &mut self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        if !self.is_open() {
            return Err(McpError::NotReady(self.name.clone()));
        }

        #[cfg(feature = "telemetry")]
        let start = Instant::now();

        let transport = &mut self.transport;
        let result = Self::with_timeout_of(&self.name, self.tool_timeout, "call_tool", async move {
            transport
                .request(
                    "tools/call",
                    Some(json!({ "name": tool_name, "arguments": arguments })),
                )
                .await
        })
        .await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_tool(
            &format!("mcp.{}.{}", self.name, tool_name),
            start.elapsed(),
            result.is_ok(),
        );

        match result {
            Ok(value) => Ok(McpToolResult::from_wire(&value)),
            // The server rejected the call; report it as a tool-level error.
            Err(McpError::Protocol { message, .. }) => Ok(McpToolResult::error(message)),
            Err(e) => Err(McpError::tool_failed(tool_name, e.to_string())),
        }
    }

    /// Release the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.transport.close().await;
        if self.state == ConnectionState::Opened {
            debug!(server = %self.name, "MCP server closed");
        }
        self.state = ConnectionState::Closed;
    }

    /// Synchronous best-effort release for drop paths.
    pub(crate) fn abort(&mut self) {
        if self.state != ConnectionState::Closed {
            self.transport.abort();
            self.state = ConnectionState::Closed;
        }
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("state", &self.state)
            .finish()
    }
}
