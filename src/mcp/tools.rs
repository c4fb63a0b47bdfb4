// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Host-facing entry point.
//!
//! [`load_mcp_tools`] opens every configured server, discovers their tools
//! and hands back the registry together with an [`McpCloser`]. The closer is
//! the host's single cleanup capability: clone it freely, call
//! [`McpCloser::close`] once at shutdown (or let [`install_shutdown_hook`]
//! do it on ctrl-c).

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::ServerDescriptor;
use super::error::McpError;
use super::lifecycle::{LifecycleManager, OpenReport};
use super::registry::{discover_tools, Registry};
use super::types::{McpToolInfo, McpToolResult};

/// Shared handle to the connection group; closing it releases every server.
#[derive(Clone)]
pub struct McpCloser {
    manager: Arc<Mutex<LifecycleManager>>,
}

impl McpCloser {
    fn new(manager: LifecycleManager) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
        }
    }

    /// Close every live connection. Safe to call more than once.
    pub async fn close(&self) {
        self.manager.lock().await.close_all().await;
    }

    /// Whether the group has been closed.
    pub async fn is_closed(&self) -> bool {
        self.manager.lock().await.is_closed()
    }

    /// Number of live connections.
    pub async fn live_count(&self) -> usize {
        self.manager.lock().await.live_count()
    }

    /// Replace the live group with a fresh one built from `descriptors`.
    ///
    /// Registries from the previous load become stale.
    pub async fn reload(&self, descriptors: &[ServerDescriptor]) -> Result<McpToolset, McpError> {
        let mut manager = self.manager.lock().await;
        let report = manager.open_all(descriptors).await?;
        let registry = discover_tools(&manager).await;
        drop(manager);

        Ok(McpToolset {
            registry: Arc::new(registry),
            report,
            closer: self.clone(),
        })
    }

    /// Route a call for the registry entry at `index`.
    ///
    /// The group lock is only held while the call is bound to its handle,
    /// so [`close`](Self::close) never waits for a running call.
    pub async fn call_tool(
        &self,
        registry: &Registry,
        index: usize,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        let call = registry.prepare_call(&*self.manager.lock().await, index)?;
        call.run(arguments).await
    }
}

impl std::fmt::Debug for McpCloser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpCloser").finish_non_exhaustive()
    }
}

/// Everything a host needs after loading.
#[derive(Debug, Clone)]
pub struct McpToolset {
    pub registry: Arc<Registry>,
    pub report: OpenReport,
    pub closer: McpCloser,
}

impl McpToolset {
    /// Discovered tools in registry order.
    pub fn tools(&self) -> impl Iterator<Item = &McpToolInfo> {
        self.registry.iter()
    }

    /// One callable wrapper per registry entry.
    pub fn wrappers(&self) -> Vec<McpToolWrapper> {
        (0..self.registry.len())
            .map(|index| McpToolWrapper {
                registry: self.registry.clone(),
                index,
                closer: self.closer.clone(),
            })
            .collect()
    }
}

/// A single MCP tool bound to the connection that serves it.
#[derive(Debug, Clone)]
pub struct McpToolWrapper {
    registry: Arc<Registry>,
    index: usize,
    closer: McpCloser,
}

impl McpToolWrapper {
    /// Get the tool info.
    pub fn info(&self) -> &McpToolInfo {
        &self.registry.tools()[self.index].tool
    }

    /// Get the qualified tool name.
    pub fn qualified_name(&self) -> String {
        self.info().qualified_name()
    }

    /// Check if this tool should be auto-approved.
    pub fn is_auto_approved(&self, auto_approve_list: &[String]) -> bool {
        let info = self.info();
        auto_approve_list.iter().any(|pattern| {
            pattern == &info.name || *pattern == info.qualified_name() || pattern == "*"
        })
    }

    /// Tool definition in the shape model providers expect.
    pub fn definition(&self) -> Value {
        let info = self.info();
        json!({
            "name": info.qualified_name(),
            "description": info
                .description
                .clone()
                .unwrap_or_else(|| format!("MCP tool {} from {}", info.name, info.server)),
            "input_schema": info.input_schema,
        })
    }

    /// Invoke the tool.
    pub async fn call(&self, arguments: Value) -> Result<McpToolResult, McpError> {
        debug!(tool = %self.qualified_name(), "Calling MCP tool");
        self.closer
            .call_tool(&self.registry, self.index, arguments)
            .await
    }
}

/// Open every descriptor and discover tools with the default transport factory.
pub async fn load_mcp_tools(descriptors: &[ServerDescriptor]) -> Result<McpToolset, McpError> {
    load_mcp_tools_with(descriptors, LifecycleManager::new()).await
}

/// Like [`load_mcp_tools`], with a caller-supplied manager.
pub async fn load_mcp_tools_with(
    descriptors: &[ServerDescriptor],
    manager: LifecycleManager,
) -> Result<McpToolset, McpError> {
    let closer = McpCloser::new(manager);
    let toolset = closer.reload(descriptors).await?;

    info!(
        servers = toolset.report.opened(),
        tools = toolset.registry.len(),
        "Loaded MCP tools"
    );
    for (name, servers) in toolset.registry.duplicate_names() {
        warn!(tool = %name, servers = ?servers, "Tool name offered by several servers");
    }

    Ok(toolset)
}

/// Exit status used after an interrupt, as a shell reports SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Close the group and exit when the process receives ctrl-c.
///
/// Listening for ctrl-c replaces the default handler, so the hook ends the
/// process itself once every connection is released.
pub fn install_shutdown_hook(closer: McpCloser) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, closing MCP servers");
                // Keep the group locked until exit so no other task can
                // race the shutdown with its own close.
                let mut manager = closer.manager.lock().await;
                manager.close_all().await;
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            Err(e) => warn!(error = %e, "Could not listen for ctrl-c"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::lifecycle::tests::{scripted, server};
    use std::time::Duration;

    #[tokio::test]
    async fn test_load_and_close() {
        let (manager, closes) = scripted();
        let toolset = load_mcp_tools_with(
            &[server("a", &["read"]), server("fail-b", &["x"]), server("c", &["search"])],
            manager,
        )
        .await
        .unwrap();

        assert_eq!(toolset.report.opened(), 2);
        assert_eq!(toolset.report.failed(), 1);
        let names: Vec<_> = toolset.tools().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["read", "search"]);
        assert_eq!(toolset.closer.live_count().await, 2);

        let closer = toolset.closer.clone();
        closer.close().await;
        toolset.closer.close().await;
        assert!(toolset.closer.is_closed().await);
        // One close for the failed open, two for the live handles.
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 3);

        assert!(matches!(
            closer.reload(&[server("d", &["t"])]).await,
            Err(McpError::LifecycleClosed)
        ));
    }

    #[tokio::test]
    async fn test_wrappers_call_through_closer() {
        let (manager, _) = scripted();
        let toolset = load_mcp_tools_with(&[server("fs", &["read_file"])], manager)
            .await
            .unwrap();

        let wrappers = toolset.wrappers();
        assert_eq!(wrappers.len(), 1);
        let wrapper = &wrappers[0];
        assert_eq!(wrapper.qualified_name(), "mcp__fs__read_file");
        assert_eq!(wrapper.definition()["name"], "mcp__fs__read_file");
        assert!(wrapper.is_auto_approved(&["read_file".to_string()]));
        assert!(!wrapper.is_auto_approved(&["write_file".to_string()]));

        let result = wrapper.call(json!({ "path": "/tmp" })).await.unwrap();
        assert_eq!(result.as_text(), "called \"read_file\"");

        toolset.closer.close().await;
        assert!(matches!(
            wrapper.call(json!({})).await,
            Err(McpError::StaleRegistry)
        ));
    }

    #[tokio::test]
    async fn test_reload_replaces_generation() {
        let (manager, _) = scripted();
        let first = load_mcp_tools_with(&[server("a", &["one"])], manager)
            .await
            .unwrap();
        let second = first.closer.reload(&[server("b", &["two"])]).await.unwrap();

        assert_eq!(second.registry.generation(), first.registry.generation() + 1);
        assert!(matches!(
            first.wrappers()[0].call(json!({})).await,
            Err(McpError::StaleRegistry)
        ));
        assert!(!second.wrappers()[0].call(json!({})).await.unwrap().is_error);

        second.closer.close().await;
    }

    #[tokio::test]
    async fn test_close_does_not_wait_for_running_call() {
        let (manager, _) = scripted();
        let toolset = load_mcp_tools_with(&[server("slow-a", &["wait"])], manager)
            .await
            .unwrap();

        let wrapper = toolset.wrappers().remove(0);
        let call = tokio::spawn(async move { wrapper.call(json!({})).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!call.is_finished());

        tokio::time::timeout(Duration::from_secs(5), toolset.closer.close())
            .await
            .expect("close waited for the running call");
        assert!(toolset.closer.is_closed().await);

        let result = tokio::time::timeout(Duration::from_secs(5), call)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(McpError::Interrupted(ref tool)) if tool == "wait"));
    }

    #[tokio::test]
    async fn test_reload_interrupts_running_call() {
        let (manager, _) = scripted();
        let first = load_mcp_tools_with(&[server("slow-a", &["wait"])], manager)
            .await
            .unwrap();

        let wrapper = first.wrappers().remove(0);
        let call = tokio::spawn(async move { wrapper.call(json!({})).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = tokio::time::timeout(
            Duration::from_secs(5),
            first.closer.reload(&[server("b", &["two"])]),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(matches!(call.await.unwrap(), Err(McpError::Interrupted(_))));
        assert_eq!(second.registry.len(), 1);

        second.closer.close().await;
    }

    #[tokio::test]
    async fn test_empty_descriptors() {
        let toolset = load_mcp_tools(&[]).await.unwrap();
        assert!(toolset.registry.is_empty());
        assert_eq!(toolset.report.entries.len(), 0);
        toolset.closer.close().await;
    }
}
