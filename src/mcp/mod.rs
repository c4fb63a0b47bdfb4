// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model Context Protocol (MCP) client orchestration.
//!
//! Connects to a list of configured MCP servers over stdio, SSE or
//! streamable HTTP, discovers their tools, and keeps every connection under
//! one lifecycle so the host can release them all at once.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     LifecycleManager                      │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐     │
//! │  │ ClientHandle │  │ ClientHandle │  │ ClientHandle │     │
//! │  │  (server1)   │  │  (server2)   │  │  (server3)   │     │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘     │
//! └─────────┼─────────────────┼─────────────────┼─────────────┘
//!           │                 │                 │
//!     ┌─────▼─────┐     ┌─────▼─────┐     ┌─────▼─────┐
//!     │   Stdio   │     │    SSE    │     │   HTTP    │
//!     │ Transport │     │ Transport │     │ Transport │
//!     └───────────┘     └───────────┘     └───────────┘
//! ```
//!
//! Descriptors go through the [`TransportFactory`] (which resolves
//! environment indirections and auth blocks), opened handles are owned by
//! the [`LifecycleManager`], and [`discover_tools`] flattens their tools
//! into a [`Registry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use agentcli::config::load_config;
//! use agentcli::mcp::{install_shutdown_hook, load_mcp_tools};
//!
//! let config = load_config(&workspace)?;
//! let toolset = load_mcp_tools(&config.mcp_servers).await?;
//! install_shutdown_hook(toolset.closer.clone());
//!
//! for tool in toolset.tools() {
//!     println!("{} ({})", tool.name, tool.server);
//! }
//!
//! toolset.closer.close().await;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod registry;
pub mod tools;
pub mod transport;
pub mod types;

pub use auth::{resolve_auth, AuthParts};
pub use client::ClientHandle;
pub use config::{AuthSpec, ResolvedServerDescriptor, ServerDescriptor, TransportKind};
pub use error::McpError;
pub use factory::{BuildOutcome, Connector, TransportFactory};
pub use lifecycle::{
    LifecycleManager, OpenReport, OutcomeKind, ServerReport, SharedHandle, ToolCall,
};
pub use registry::{discover_tools, RegisteredTool, Registry};
pub use tools::{
    install_shutdown_hook, load_mcp_tools, load_mcp_tools_with, McpCloser, McpToolWrapper,
    McpToolset,
};
pub use types::*;
