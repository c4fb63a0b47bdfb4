// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SSE transport: a long-lived event stream carries responses, requests are
//! POSTed to the endpoint announced by the server's first `endpoint` event.
//!
//! Custom headers are not supported on this transport; they are resolved
//! upstream only so a warning can be logged.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::jsonrpc::{self, SseEvent, SseParser};
use super::Transport;
use crate::mcp::config::{SseParams, TransportKind};
use crate::mcp::error::McpError;

/// Connection to a server over server-sent events.
pub struct SseTransport {
    server: String,
    params: SseParams,
    client: Client,
    endpoint: Option<Url>,
    events: Option<mpsc::UnboundedReceiver<SseEvent>>,
    reader: Option<JoinHandle<()>>,
    next_id: u64,
}

impl SseTransport {
    pub fn new(server: impl Into<String>, params: SseParams) -> Self {
        Self {
            server: server.into(),
            params,
            client: Client::new(),
            endpoint: None,
            events: None,
            reader: None,
            next_id: 0,
        }
    }

    /// POST endpoint announced by the server.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn next_event(&mut self) -> Result<SseEvent, McpError> {
        let events = self
            .events
            .as_mut()
            .ok_or_else(|| McpError::NotReady(self.server.clone()))?;
        events
            .recv()
            .await
            .ok_or_else(|| McpError::connection_failed(&self.server, "event stream closed"))
    }

    async fn post(&self, message: &Value) -> Result<(), McpError> {
        let endpoint = self
            .endpoint
            .as_ref()
            .ok_or_else(|| McpError::NotReady(self.server.clone()))?;

        let response = self
            .client
            .post(endpoint.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| McpError::connection_failed(&self.server, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST {} returned {}: {}",
                endpoint, status, body
            )));
        }
        Ok(())
    }
}

/// Resolve the `endpoint` event's data against the stream URL.
pub(crate) fn resolve_endpoint(base: &Url, data: &str) -> Result<Url, McpError> {
    base.join(data.trim())
        .map_err(|e| McpError::InvalidResponse(format!("invalid endpoint '{}': {}", data, e)))
}

#[async_trait]
impl Transport for SseTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn connect(&mut self) -> Result<(), McpError> {
        if self.reader.is_some() {
            return Ok(());
        }

        let response = self
            .client
            .get(self.params.url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| McpError::connection_failed(&self.server, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::connection_failed(
                &self.server,
                format!("event stream returned {}", status),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let server = self.server.clone();
        let mut stream = response.bytes_stream();

        self.reader = Some(tokio::spawn(async move {
            let mut parser = SseParser::new();
            // Bytes after the last newline; a chunk may end mid-character.
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(server = %server, error = %e, "SSE stream error");
                        break;
                    }
                };
                pending.extend_from_slice(&chunk);
                let Some(end) = pending.iter().rposition(|b| *b == b'\n') else {
                    continue;
                };
                let complete: Vec<u8> = pending.drain(..=end).collect();
                for event in parser.push(&String::from_utf8_lossy(&complete)) {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            debug!(server = %server, "SSE stream ended");
        }));
        self.events = Some(rx);

        loop {
            let event = self.next_event().await?;
            if event.event == "endpoint" {
                let endpoint = resolve_endpoint(&self.params.url, &event.data)?;
                debug!(server = %self.server, endpoint = %endpoint, "SSE endpoint announced");
                self.endpoint = Some(endpoint);
                return Ok(());
            }
            trace!(server = %self.server, event = %event.event, "Ignoring event before endpoint");
        }
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_request_id();
        self.post(&jsonrpc::request(id, method, params)).await?;

        loop {
            let event = self.next_event().await?;
            if !event.is_message() {
                continue;
            }
            match serde_json::from_str::<Value>(&event.data) {
                Ok(message) if jsonrpc::is_response_to(&message, id) => {
                    return jsonrpc::into_result(message);
                }
                Ok(_) => trace!(server = %self.server, "Skipping unrelated message"),
                Err(e) => debug!(server = %self.server, error = %e, "Skipping malformed event data"),
            }
        }
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.post(&jsonrpc::notification(method, params)).await
    }

    async fn close(&mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.events = None;
        self.endpoint = None;
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.abort();
    }
}
