// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transport factory.
//!
//! Turns one [`ServerDescriptor`] into an opened [`ClientHandle`], or says
//! why it could not. Configuration problems come back as
//! [`BuildOutcome::Skipped`]; anything that goes wrong while talking to the
//! server comes back as [`BuildOutcome::Failed`]. Neither is ever raised.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, warn};

use super::auth::resolve_auth;
use super::client::ClientHandle;
use super::config::{
    HttpParams, ResolvedServerDescriptor, ResolvedTransport, ServerDescriptor, SseParams,
    StdioParams, TransportKind, SUPPORTED_TRANSPORTS,
};
use super::error::McpError;
use super::transport::{SseTransport, StdioTransport, StreamableHttpTransport, Transport};
use crate::config::{resolve_lenient, to_string_map, EnvSource, ProcessEnv};

/// Result of building one descriptor.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The handle is open and ready for discovery.
    Opened(ClientHandle),

    /// The descriptor was not usable; nothing was started.
    Skipped { reason: String },

    /// The server was reachable in principle but opening it failed.
    Failed { error: McpError },
}

impl BuildOutcome {
    /// Classify an error from resolution or open.
    pub fn from_error(error: McpError) -> Self {
        if error.is_skip() {
            Self::Skipped {
                reason: error.to_string(),
            }
        } else {
            Self::Failed { error }
        }
    }

    /// Check if the outcome is an opened handle.
    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened(_))
    }
}

/// Builds opened handles from descriptors.
///
/// [`TransportFactory`] is the real implementation; the lifecycle layer only
/// depends on this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolve, construct and open one server.
    async fn build(&self, descriptor: &ServerDescriptor) -> BuildOutcome;
}

/// Connector for the stdio, SSE and streamable HTTP transports.
#[derive(Clone)]
pub struct TransportFactory {
    env: Arc<dyn EnvSource>,
}

impl Default for TransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory {
    /// Create a factory reading the process environment.
    pub fn new() -> Self {
        Self {
            env: Arc::new(ProcessEnv),
        }
    }

    /// Create a factory reading an explicit environment source.
    pub fn with_env(env: Arc<dyn EnvSource>) -> Self {
        Self { env }
    }

    /// Resolve a descriptor into literal transport parameters.
    pub fn resolve(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<ResolvedServerDescriptor, McpError> {
        let name = descriptor.label().to_string();

        if let Some(reason) = &descriptor.invalid {
            return Err(McpError::Config(format!("server '{}' {}", name, reason)));
        }

        if !descriptor.enabled {
            return Err(McpError::Disabled(name));
        }

        let kind = TransportKind::parse(&descriptor.transport).ok_or_else(|| {
            warn!(
                server = %name,
                transport = %descriptor.transport,
                "Unsupported transport, supported: {}",
                SUPPORTED_TRANSPORTS.join(", ")
            );
            McpError::UnsupportedTransport {
                transport: descriptor.transport.clone(),
                supported: SUPPORTED_TRANSPORTS.join(", "),
            }
        })?;

        let transport = match kind {
            TransportKind::Stdio => ResolvedTransport::Stdio(self.resolve_stdio(&name, descriptor)?),
            TransportKind::Sse => ResolvedTransport::Sse(self.resolve_sse(&name, descriptor)?),
            TransportKind::StreamableHttp => {
                ResolvedTransport::StreamableHttp(self.resolve_http(&name, descriptor)?)
            }
        };

        Ok(ResolvedServerDescriptor {
            name,
            transport,
            timeout: Duration::from_secs(descriptor.timeout_secs),
            tool_timeout: Duration::from_secs(descriptor.tool_timeout_secs),
            filter: descriptor.tool_filter(),
        })
    }

    fn resolve_stdio(
        &self,
        name: &str,
        descriptor: &ServerDescriptor,
    ) -> Result<StdioParams, McpError> {
        let Some((program, args)) = descriptor.command.split_first() else {
            return Err(McpError::Config(format!(
                "stdio server '{}' has no command",
                name
            )));
        };
        if program.trim().is_empty() {
            return Err(McpError::Config(format!(
                "stdio server '{}' has an empty command",
                name
            )));
        }

        let env = resolve_lenient(&descriptor.env, self.env.as_ref());

        Ok(StdioParams {
            program: program.clone(),
            args: args.to_vec(),
            env: to_string_map(&env, "env"),
            cwd: descriptor.cwd.as_ref().map(PathBuf::from),
        })
    }

    fn resolve_sse(&self, name: &str, descriptor: &ServerDescriptor) -> Result<SseParams, McpError> {
        let url = parse_url(name, descriptor)?;
        let mut headers = self.resolve_map(&descriptor.headers, "headers");
        let mut params = self.resolve_map(&descriptor.params, "params");

        if let Some(auth) = &descriptor.auth {
            let parts = resolve_auth(auth, self.env.as_ref());
            headers.extend(parts.headers);
            params.extend(parts.params);
        }

        if !headers.is_empty() {
            warn!(
                server = %name,
                count = headers.len(),
                "sse transport does not support custom headers; they will not be sent"
            );
        }

        Ok(SseParams { url, headers, params })
    }

    fn resolve_http(
        &self,
        name: &str,
        descriptor: &ServerDescriptor,
    ) -> Result<HttpParams, McpError> {
        let url = parse_url(name, descriptor)?;
        let mut headers = self.resolve_map(&descriptor.headers, "headers");
        let mut params = self.resolve_map(&descriptor.params, "params");

        if let Some(auth) = &descriptor.auth {
            let parts = resolve_auth(auth, self.env.as_ref());
            headers.extend(parts.headers);
            params.extend(parts.params);
        }

        Ok(HttpParams { url, headers, params })
    }

    fn resolve_map(
        &self,
        value: &serde_json::Value,
        field: &str,
    ) -> std::collections::HashMap<String, String> {
        to_string_map(&resolve_lenient(value, self.env.as_ref()), field)
    }

    /// Resolve a descriptor and wrap the matching transport, without opening it.
    pub fn prepare(&self, descriptor: &ServerDescriptor) -> Result<ClientHandle, McpError> {
        let resolved = self.resolve(descriptor)?;
        let name = resolved.name.clone();

        let transport: Box<dyn Transport> = match resolved.transport {
            ResolvedTransport::Stdio(params) => Box::new(StdioTransport::new(&name, params)),
            ResolvedTransport::Sse(params) => Box::new(SseTransport::new(&name, params)),
            ResolvedTransport::StreamableHttp(params) => {
                Box::new(StreamableHttpTransport::new(&name, params))
            }
        };

        Ok(ClientHandle::new(name, transport)
            .with_timeout(resolved.timeout)
            .with_tool_timeout(resolved.tool_timeout)
            .with_filter(resolved.filter))
    }
}

fn parse_url(name: &str, descriptor: &ServerDescriptor) -> Result<Url, McpError> {
    let raw = descriptor
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            McpError::Config(format!(
                "{} server '{}' has no url",
                descriptor.transport, name
            ))
        })?;

    Url::parse(raw)
        .map_err(|e| McpError::Config(format!("server '{}' has invalid url '{}': {}", name, raw, e)))
}

#[async_trait]
impl Connector for TransportFactory {
    async fn build(&self, descriptor: &ServerDescriptor) -> BuildOutcome {
        let mut handle = match self.prepare(descriptor) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(server = %descriptor.label(), reason = %e, "Descriptor not usable");
                return BuildOutcome::from_error(e);
            }
        };

        match handle.open().await {
            Ok(_) => BuildOutcome::Opened(handle),
            Err(e) => BuildOutcome::from_error(e),
        }
    }
}
