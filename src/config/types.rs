// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration types for agent projects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::env::{resolve_with, EnvSource, ResolveMode};
use crate::error::ConfigError;
use crate::mcp::ServerDescriptor;

/// Contents of an agent project's `.agent.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Project name.
    #[serde(default)]
    pub name: Option<String>,

    /// Model provider block; keys may be indirections.
    #[serde(default)]
    pub model: Value,

    /// External tool servers, in the order they should be opened.
    #[serde(default, deserialize_with = "crate::mcp::config::deserialize_servers")]
    pub mcp_servers: Vec<ServerDescriptor>,
}

impl AgentConfig {
    /// Model block with every indirection resolved.
    ///
    /// Resolution is strict: a provider configured with a missing secret
    /// would fail later in a far less obvious way.
    pub fn resolved_model(&self, env: &dyn EnvSource) -> Result<Value, ConfigError> {
        resolve_with(&self.model, ResolveMode::Strict, env)
    }

    /// Servers not disabled in configuration.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerDescriptor> {
        self.mcp_servers.iter().filter(|s| s.enabled)
    }
}
