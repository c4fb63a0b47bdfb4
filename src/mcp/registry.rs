// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tool aggregation across live MCP connections.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::error::McpError;
use super::lifecycle::{LifecycleManager, ToolCall};
use super::types::{McpToolInfo, McpToolResult};

/// A discovered tool and the live handle that serves it.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub tool: McpToolInfo,
    handle: usize,
}

impl RegisteredTool {
    /// Index of the owning handle in the manager's live set.
    pub fn handle_id(&self) -> usize {
        self.handle
    }
}

/// Flat, ordered list of tools from every live server.
///
/// Order follows the live handles, then each server's own listing order.
/// Names are not deduplicated.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: Vec<RegisteredTool>,
    generation: u64,
}

impl Registry {
    /// All entries in order.
    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Iterate over the tool descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &McpToolInfo> {
        self.tools.iter().map(|t| &t.tool)
    }

    /// Generation of the connection group this registry was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// First tool with the given name.
    pub fn find(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.tool.name == name)
    }

    /// Tools served by one server.
    pub fn by_server<'a>(&'a self, server: &'a str) -> impl Iterator<Item = &'a McpToolInfo> + 'a {
        self.iter().filter(move |t| t.server == server)
    }

    /// Tool names offered by more than one entry, with their owning servers.
    pub fn duplicate_names(&self) -> Vec<(String, Vec<String>)> {
        let mut owners: HashMap<&str, Vec<String>> = HashMap::new();
        let mut order = Vec::new();
        for tool in self.iter() {
            let servers = owners.entry(tool.name.as_str()).or_default();
            if servers.is_empty() {
                order.push(tool.name.as_str());
            }
            servers.push(tool.server.clone());
        }

        order
            .into_iter()
            .filter_map(|name| {
                owners
                    .remove(name)
                    .filter(|servers| servers.len() > 1)
                    .map(|servers| (name.to_string(), servers))
            })
            .collect()
    }

    /// Drop provenance and keep the descriptors.
    pub fn into_tools(self) -> Vec<McpToolInfo> {
        self.tools.into_iter().map(|t| t.tool).collect()
    }

    /// Bind the entry at `index` to its live handle.
    pub fn prepare_call(
        &self,
        manager: &LifecycleManager,
        index: usize,
    ) -> Result<ToolCall, McpError> {
        let entry = self
            .tools
            .get(index)
            .ok_or_else(|| McpError::ToolNotFound(format!("#{}", index)))?;
        manager.prepare_call(self.generation, entry.handle, &entry.tool.name)
    }

    /// Call the entry at `index` through the manager that owns its handle.
    pub async fn call_tool(
        &self,
        manager: &LifecycleManager,
        index: usize,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        self.prepare_call(manager, index)?.run(arguments).await
    }

    /// Call the first tool named `name`.
    pub async fn call_tool_by_name(
        &self,
        manager: &LifecycleManager,
        name: &str,
        arguments: Value,
    ) -> Result<McpToolResult, McpError> {
        let index = self
            .tools
            .iter()
            .position(|t| t.tool.name == name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        self.call_tool(manager, index, arguments).await
    }
}

/// List tools on every live handle, in order.
///
/// A handle whose listing fails or times out contributes nothing and is
/// logged; tools gathered from earlier handles are kept.
pub async fn discover_tools(manager: &LifecycleManager) -> Registry {
    let mut registry = Registry {
        tools: Vec::new(),
        generation: manager.generation(),
    };

    for id in 0..manager.live_count() {
        let Some(handle) = manager.handle(id) else {
            break;
        };
        let mut handle = handle.lock().await;
        match handle.list_tools().await {
            Ok(tools) => {
                debug!(server = %handle.name(), count = tools.len(), "Registered MCP tools");
                registry
                    .tools
                    .extend(tools.into_iter().map(|tool| RegisteredTool { tool, handle: id }));
            }
            Err(e) => {
                warn!(server = %handle.name(), error = %e, "Tool discovery failed, skipping server");
            }
        }
    }

    registry
}
