// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lifecycle management for a group of MCP connections.
//!
//! The [`LifecycleManager`] owns every opened [`ClientHandle`] and is the
//! only place connections are released. Handles are closed together, in
//! reverse open order. Once [`LifecycleManager::close_all`] has run the
//! manager refuses to open anything else.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::ClientHandle;
use super::config::ServerDescriptor;
use super::error::McpError;
use super::factory::{BuildOutcome, Connector, TransportFactory};
use super::types::McpToolResult;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

/// What happened to one descriptor during a batch open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Opened,
    Skipped,
    Failed,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened => write!(f, "opened"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Report entry for one descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct ServerReport {
    pub name: String,
    pub transport: String,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Per-descriptor outcomes of a batch open, in descriptor order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OpenReport {
    pub entries: Vec<ServerReport>,
}

impl OpenReport {
    fn count(&self, outcome: OutcomeKind) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    /// Number of opened servers.
    pub fn opened(&self) -> usize {
        self.count(OutcomeKind::Opened)
    }

    /// Number of skipped descriptors.
    pub fn skipped(&self) -> usize {
        self.count(OutcomeKind::Skipped)
    }

    /// Number of servers that failed to open.
    pub fn failed(&self) -> usize {
        self.count(OutcomeKind::Failed)
    }
}

impl fmt::Display for OpenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} opened, {} skipped, {} failed",
            self.opened(),
            self.skipped(),
            self.failed()
        )
    }
}

/// A handle shared between the manager and in-flight tool calls.
pub type SharedHandle = Arc<Mutex<ClientHandle>>;

struct LiveHandle {
    name: String,
    handle: SharedHandle,
}

/// Owner of the live connection group.
pub struct LifecycleManager {
    connector: Arc<dyn Connector>,
    handles: Vec<LiveHandle>,
    generation: u64,
    closed: bool,
    /// Cancelled when the current generation is released.
    cancel: CancellationToken,
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager {
    /// Create a manager backed by the default [`TransportFactory`].
    pub fn new() -> Self {
        Self::with_connector(Arc::new(TransportFactory::new()))
    }

    /// Create a manager backed by an explicit connector.
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handles: Vec::new(),
            generation: 0,
            closed: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Open every descriptor, in order.
    ///
    /// A live group from an earlier call is closed first. Per-server
    /// problems land in the report; the only error is calling this after
    /// [`close_all`](Self::close_all).
    pub async fn open_all(
        &mut self,
        descriptors: &[ServerDescriptor],
    ) -> Result<OpenReport, McpError> {
        if self.closed {
            return Err(McpError::LifecycleClosed);
        }

        if !self.handles.is_empty() {
            debug!(count = self.handles.len(), "Closing previous MCP connections");
        }
        self.close_handles().await;
        self.generation += 1;

        let mut report = OpenReport::default();
        for descriptor in descriptors {
            let name = descriptor.label().to_string();
            let transport = descriptor.transport.clone();

            let (outcome, reason) = match self.connector.build(descriptor).await {
                BuildOutcome::Opened(handle) => {
                    self.handles.push(LiveHandle {
                        name: name.clone(),
                        handle: Arc::new(Mutex::new(handle)),
                    });
                    (OutcomeKind::Opened, None)
                }
                BuildOutcome::Skipped { reason } => {
                    warn!(server = %name, reason = %reason, "Skipping MCP server");
                    (OutcomeKind::Skipped, Some(reason))
                }
                BuildOutcome::Failed { error } => {
                    warn!(server = %name, error = %error, "Failed to open MCP server");
                    (OutcomeKind::Failed, Some(error.to_string()))
                }
            };

            report.entries.push(ServerReport {
                name,
                transport,
                outcome,
                reason,
            });
        }

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_batch(report.opened(), report.skipped(), report.failed());

        info!(generation = self.generation, "MCP servers: {}", report);
        Ok(report)
    }

    /// Names of the live handles in open order.
    pub fn handle_names(&self) -> impl Iterator<Item = &str> {
        self.handles.iter().map(|h| h.name.as_str())
    }

    /// Shared access to one live handle.
    pub fn handle(&self, id: usize) -> Option<SharedHandle> {
        self.handles.get(id).map(|h| h.handle.clone())
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.handles.len()
    }

    /// Counter bumped by every successful `open_all`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `close_all` has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Bind a call to the handle at `id` of the given generation.
    ///
    /// The returned [`ToolCall`] does not borrow the manager, so the manager
    /// can be closed while the call runs; the call then ends with
    /// [`McpError::Interrupted`].
    pub fn prepare_call(
        &self,
        generation: u64,
        id: usize,
        tool_name: &str,
    ) -> Result<ToolCall, McpError> {
        if self.closed || generation != self.generation {
            return Err(McpError::StaleRegistry);
        }
        let live = self.handles.get(id).ok_or(McpError::StaleRegistry)?;
        Ok(ToolCall {
            handle: live.handle.clone(),
            tool: tool_name.to_string(),
            cancel: self.cancel.clone(),
        })
    }

    /// Call a tool on the handle at `id` of the given generation.
    pub async fn call_tool(
        &self,
        generation: u64,
        id: usize,
        tool_name: &str,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        self.prepare_call(generation, id, tool_name)?
            .run(arguments)
            .await
    }

    /// Close every live handle, newest first. Idempotent; afterwards the
    /// manager rejects further opens.
    pub async fn close_all(&mut self) {
        if self.closed {
            return;
        }
        self.close_handles().await;
        self.closed = true;
        debug!("MCP lifecycle closed");
    }

    async fn close_handles(&mut self) {
        // Running calls give their handle locks back once cancelled.
        std::mem::replace(&mut self.cancel, CancellationToken::new()).cancel();
        while let Some(live) = self.handles.pop() {
            live.handle.lock().await.close().await;
        }
    }
}

/// A tool call bound to one live handle.
pub struct ToolCall {
    handle: SharedHandle,
    tool: String,
    cancel: CancellationToken,
}

impl ToolCall {
    /// Run the call, or stop early if its generation is released.
    pub async fn run(self, arguments: Value) -> Result<McpToolResult, McpError> {
        let Self {
            handle,
            tool,
            cancel,
        } = self;

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(tool = %tool, "Tool call interrupted by close");
                Err(McpError::Interrupted(tool.clone()))
            }
            result = async { handle.lock().await.call_tool(&tool, arguments).await } => result,
        }
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.cancel.cancel();
        if self.handles.is_empty() {
            return;
        }
        warn!(
            count = self.handles.len(),
            "MCP lifecycle dropped without close_all, aborting connections"
        );
        for live in self.handles.iter().rev() {
            // A handle still locked by a call is released when its last
            // reference drops.
            if let Ok(mut handle) = live.handle.try_lock() {
                handle.abort();
            }
        }
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.handle_names().collect();
        f.debug_struct("LifecycleManager")
            .field("handles", &names)
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .finish()
    }
}
