// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stdio transport: newline-delimited JSON-RPC over a child process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace};

use super::jsonrpc;
use super::Transport;
use crate::mcp::config::{StdioParams, TransportKind};
use crate::mcp::error::McpError;

/// How long `close` waits for the child to exit after stdin is closed.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Child process speaking MCP on stdin/stdout.
pub struct StdioTransport {
    server: String,
    params: StdioParams,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    next_id: u64,
}

impl StdioTransport {
    /// Create a transport; nothing is spawned until [`Transport::connect`].
    pub fn new(server: impl Into<String>, params: StdioParams) -> Self {
        Self {
            server: server.into(),
            params,
            child: None,
            stdin: None,
            stdout: None,
            next_id: 0,
        }
    }

    /// Process id of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn write_message(&mut self, message: &Value) -> Result<(), McpError> {
        let server = &self.server;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| McpError::NotReady(server.clone()))?;

        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        trace!(server = %server, message = %line.trim_end(), "stdio send");

        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::connection_failed(server, e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::connection_failed(server, e.to_string()))
    }

    /// Read lines until the response to `id` arrives.
    ///
    /// Server-initiated notifications and non-JSON output are skipped.
    async fn read_response(&mut self, id: u64) -> Result<Value, McpError> {
        let server = &self.server;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| McpError::NotReady(server.clone()))?;

        loop {
            let line = stdout
                .next_line()
                .await
                .map_err(|e| McpError::connection_failed(server, e.to_string()))?
                .ok_or_else(|| McpError::connection_failed(server, "server closed stdout"))?;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(message) if jsonrpc::is_response_to(&message, id) => return Ok(message),
                Ok(_) => trace!(server = %server, "Skipping unrelated message"),
                Err(_) => debug!(server = %server, line = %line, "Skipping non-JSON output"),
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Stdio
    }

    async fn connect(&mut self) -> Result<(), McpError> {
        if self.child.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.params.program);
        cmd.args(&self.params.args)
            .envs(&self.params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        if let Some(cwd) = &self.params.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            McpError::connection_failed(
                &self.server,
                format!("failed to spawn '{}': {}", self.params.program, e),
            )
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.start_kill();
            return Err(McpError::connection_failed(&self.server, "child pipes unavailable"));
        };

        debug!(server = %self.server, pid = ?child.id(), program = %self.params.program, "Spawned MCP server");

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout).lines());
        self.child = Some(child);
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_request_id();
        self.write_message(&jsonrpc::request(id, method, params)).await?;
        let response = self.read_response(id).await?;
        jsonrpc::into_result(response)
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.write_message(&jsonrpc::notification(method, params)).await
    }

    async fn close(&mut self) {
        // EOF on stdin asks the server to exit; it is killed after the grace period.
        self.stdin = None;
        self.stdout = None;

        let Some(mut child) = self.child.take() else {
            return;
        };
        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(server = %self.server, %status, "MCP server exited"),
            Ok(Err(e)) => debug!(server = %self.server, error = %e, "Waiting for MCP server failed"),
            Err(_) => {
                debug!(server = %self.server, "MCP server still running, killing");
                if let Err(e) = child.kill().await {
                    debug!(server = %self.server, error = %e, "Kill after close failed");
                }
            }
        }
    }

    fn abort(&mut self) {
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}
