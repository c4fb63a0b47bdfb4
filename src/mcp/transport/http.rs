// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streamable HTTP transport.
//!
//! Every message is a POST to the server URL. Responses come back either as
//! a JSON body or as a short `text/event-stream` body; the session id handed
//! out on `initialize` is echoed on later requests and released with DELETE
//! on close.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, trace};

use super::jsonrpc;
use super::{header_map, Transport};
use crate::mcp::config::{HttpParams, TransportKind};
use crate::mcp::error::McpError;

/// Header carrying the server-assigned session.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Connection to a server over streamable HTTP.
pub struct StreamableHttpTransport {
    server: String,
    params: HttpParams,
    client: Option<Client>,
    session_id: Option<String>,
    next_id: u64,
}

impl StreamableHttpTransport {
    pub fn new(server: impl Into<String>, params: HttpParams) -> Self {
        Self {
            server: server.into(),
            params,
            client: None,
            session_id: None,
            next_id: 0,
        }
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Headers sent on every request.
    pub fn default_headers(&self) -> HeaderMap {
        header_map(&self.params.headers)
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn post(&mut self, message: &Value) -> Result<Response, McpError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| McpError::NotReady(self.server.clone()))?;

        let mut request = client
            .post(self.params.url.clone())
            .header(ACCEPT, "application/json, text/event-stream")
            .json(message);
        if let Some(session) = &self.session_id {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request
            .send()
            .await
            .map_err(|e| McpError::connection_failed(&self.server, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!(
                "POST {} returned {}: {}",
                self.params.url, status, body
            )));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(session) {
                debug!(server = %self.server, "Session established");
                self.session_id = Some(session.to_string());
            }
        }

        Ok(response)
    }
}

/// Pick the response to `id` out of a POST reply body.
pub(crate) fn parse_reply(content_type: &str, body: &str, id: u64) -> Result<Value, McpError> {
    let messages: Vec<Value> = if content_type.starts_with("text/event-stream") {
        jsonrpc::parse_event_stream(body)
            .into_iter()
            .filter(|e| e.is_message())
            .filter_map(|e| serde_json::from_str(&e.data).ok())
            .collect()
    } else {
        match serde_json::from_str::<Value>(body)? {
            Value::Array(batch) => batch,
            single => vec![single],
        }
    };

    jsonrpc::find_response(messages, id)
        .ok_or_else(|| McpError::InvalidResponse(format!("no response for request {}", id)))
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    async fn connect(&mut self) -> Result<(), McpError> {
        if self.client.is_none() {
            let client = Client::builder()
                .default_headers(self.default_headers())
                .build()
                .map_err(|e| McpError::connection_failed(&self.server, e.to_string()))?;
            self.client = Some(client);
        }
        Ok(())
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_request_id();
        let response = self.post(&jsonrpc::request(id, method, params)).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| McpError::connection_failed(&self.server, e.to_string()))?;
        trace!(server = %self.server, content_type = %content_type, "HTTP reply");

        jsonrpc::into_result(parse_reply(&content_type, &body, id)?)
    }

    async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.post(&jsonrpc::notification(method, params)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let (Some(client), Some(session)) = (self.client.take(), self.session_id.take()) else {
            return;
        };

        let result = client
            .delete(self.params.url.clone())
            .header(SESSION_HEADER, session)
            .send()
            .await;
        if let Err(e) = result {
            debug!(server = %self.server, error = %e, "Session release failed");
        }
    }

    fn abort(&mut self) {
        self.client = None;
        self.session_id = None;
    }
}
