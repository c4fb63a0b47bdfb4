// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentcli - multi-transport MCP client orchestration.
//!
//! Opens a configured list of Model Context Protocol servers over stdio,
//! SSE or streamable HTTP, gathers their tools into one ordered registry,
//! and keeps every connection under a single lifecycle the host can close.
//!
//! # Architecture
//!
//! - [`config`] - `.agent.yaml` loading, `.env` overlays, `*_env` indirections
//! - [`error`] - Configuration errors
//! - [`mcp`] - Transports, client handles, lifecycle and tool registry
//! - [`telemetry`] - Tracing subscriber setup and in-process metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use agentcli::config::load_config;
//! use agentcli::mcp::load_mcp_tools;
//!
//! let config = load_config(".".as_ref())?;
//! let toolset = load_mcp_tools(&config.mcp_servers).await?;
//! println!("{} tools, {}", toolset.registry.len(), toolset.report);
//! toolset.closer.close().await;
//! ```

pub mod config;
pub mod error;
pub mod mcp;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use error::ConfigError;
pub use mcp::{load_mcp_tools, McpCloser, McpError, McpToolset, ServerDescriptor};

/// agentcli version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
