// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transports for reaching MCP servers.
//!
//! Each transport kind is one implementation of [`Transport`]; the factory
//! picks the implementation with an explicit match on
//! [`TransportKind`](super::config::TransportKind). Transports only move
//! JSON-RPC messages; the handshake and tool calls live in
//! [`ClientHandle`](super::client::ClientHandle).

mod http;
pub mod jsonrpc;
mod sse;
mod stdio;

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::warn;

pub use http::StreamableHttpTransport;
pub use sse::SseTransport;
pub use stdio::StdioTransport;

use super::config::TransportKind;
use super::error::McpError;

/// Message-level capability of a connection to one server.
#[async_trait]
pub trait Transport: Send {
    /// Which transport kind this is.
    fn kind(&self) -> TransportKind;

    /// Spawn the process or establish the stream.
    async fn connect(&mut self) -> Result<(), McpError>;

    /// Send a request and wait for its result.
    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError>;

    /// Send a notification.
    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError>;

    /// Release the process or stream. Must be safe to call more than once.
    async fn close(&mut self);

    /// Synchronous best-effort release, used when a handle is dropped
    /// without being closed.
    fn abort(&mut self) {}
}

/// Build a header map, skipping entries that are not valid HTTP headers.
pub(crate) fn header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(mut value)) => {
                if name == reqwest::header::AUTHORIZATION {
                    value.set_sensitive(true);
                }
                map.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid HTTP header"),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_skips_invalid() {
        let headers: HashMap<String, String> = [
            ("X-Tenant".to_string(), "acme".to_string()),
            ("Authorization".to_string(), "Bearer t".to_string()),
            ("bad header".to_string(), "x".to_string()),
            ("X-Newline".to_string(), "a\nb".to_string()),
        ]
        .into_iter()
        .collect();

        let map = header_map(&headers);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("x-tenant").unwrap(), "acme");
        assert!(map.get("authorization").unwrap().is_sensitive());
    }
}
