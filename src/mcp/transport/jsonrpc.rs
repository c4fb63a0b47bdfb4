// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC 2.0 framing and server-sent event parsing shared by transports.

use serde_json::{json, Value};

use crate::mcp::error::McpError;

/// Build a request message.
pub fn request(id: u64, method: &str, params: Option<Value>) -> Value {
    let mut message = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    });
    if let Some(params) = params {
        message["params"] = params;
    }
    message
}

/// Build a notification message.
pub fn notification(method: &str, params: Option<Value>) -> Value {
    let mut message = json!({
        "jsonrpc": "2.0",
        "method": method,
    });
    if let Some(params) = params {
        message["params"] = params;
    }
    message
}

/// Whether `message` is the response to request `id`.
///
/// Servers echo the id back; some echo it as a string.
pub fn is_response_to(message: &Value, id: u64) -> bool {
    if message.get("method").is_some() {
        return false;
    }
    match message.get("id") {
        Some(Value::Number(n)) => n.as_u64() == Some(id),
        Some(Value::String(s)) => s.parse::<u64>().ok() == Some(id),
        _ => false,
    }
}

/// Extract the `result` of a response, mapping `error` to [`McpError::Protocol`].
pub fn into_result(message: Value) -> Result<Value, McpError> {
    if let Some(error) = message.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let text = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        return Err(McpError::protocol(code, text));
    }

    match message {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| McpError::InvalidResponse("response has neither result nor error".to_string())),
        _ => Err(McpError::InvalidResponse("response is not an object".to_string())),
    }
}

/// Find the response to `id` among a batch of messages.
pub fn find_response(messages: impl IntoIterator<Item = Value>, id: u64) -> Option<Value> {
    messages.into_iter().find(|m| is_response_to(m, id))
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name; empty means the default `message` event.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// Whether this is a `message` event (named or default).
    pub fn is_message(&self) -> bool {
        self.event.is_empty() || self.event == "message"
    }
}

/// Incremental `text/event-stream` parser.
///
/// Feed arbitrary chunks; complete events are returned as soon as their
/// terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: String,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return the events it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a trailing event not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event.clear();
            return None;
        }
        Some(SseEvent {
            event: std::mem::take(&mut self.event),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// Parse a complete event-stream body.
pub fn parse_event_stream(body: &str) -> Vec<SseEvent> {
    let mut parser = SseParser::new();
    let mut events = parser.push(body);
    events.extend(parser.finish());
    events
}
