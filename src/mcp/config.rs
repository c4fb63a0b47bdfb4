// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! MCP server descriptors.
//!
//! Descriptors are read from the `mcp_servers` list of `.agent.yaml`:
//!
//! ```yaml
//! mcp_servers:
//!   - name: filesystem
//!     transport: stdio
//!     command: ["npx", "-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
//!     env:
//!       GITHUB_TOKEN_env: GH_TOKEN
//!   - name: search
//!     transport: streamable_http
//!     url: https://mcp.example.com/mcp
//!     headers:
//!       X-Tenant: acme
//!     auth:
//!       type: bearer
//!       token_env: SEARCH_TOKEN
//! ```
//!
//! Raw descriptors keep indirections and the transport name as written.
//! [`ResolvedServerDescriptor`] is produced by the transport factory once
//! every indirection has been substituted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Transport names accepted in configuration.
pub const SUPPORTED_TRANSPORTS: &[&str] = &["stdio", "sse", "streamable_http", "http"];

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Label used in logs, reports and tool provenance. Not required to be unique.
    #[serde(default)]
    pub name: String,

    /// Transport name as written (see [`SUPPORTED_TRANSPORTS`]).
    #[serde(default)]
    pub transport: String,

    /// Whether this server is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Executable followed by its arguments (stdio).
    #[serde(default, deserialize_with = "string_or_seq")]
    pub command: Vec<String>,

    /// Child environment (stdio); keys may be indirections.
    #[serde(default)]
    pub env: Value,

    /// Working directory (stdio).
    #[serde(default)]
    pub cwd: Option<String>,

    /// Endpoint URL (sse, streamable_http).
    #[serde(default)]
    pub url: Option<String>,

    /// Extra request headers; keys may be indirections.
    #[serde(default)]
    pub headers: Value,

    /// Query parameters; keys may be indirections.
    #[serde(default)]
    pub params: Value,

    /// Declarative authentication block.
    #[serde(default)]
    pub auth: Option<AuthSpec>,

    /// Timeout applied separately to open and to tool discovery.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for a single tool call.
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,

    /// List of enabled tools (if empty, all tools are enabled).
    #[serde(default)]
    pub enabled_tools: Vec<String>,

    /// List of disabled tools.
    #[serde(default)]
    pub disabled_tools: Vec<String>,

    /// Why the entry could not be read; such entries are reported, never opened.
    #[serde(skip)]
    pub invalid: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_tool_timeout() -> u64 {
    300
}

/// Accept `command: "server"` as well as `command: ["server", "--flag"]`.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => s.split_whitespace().map(String::from).collect(),
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

/// First top-level key that fails to deserialize on its own.
fn invalid_field(raw: &Value) -> Option<String> {
    raw.as_object()?.iter().find_map(|(key, value)| {
        let single: serde_json::Map<String, Value> =
            std::iter::once((key.clone(), value.clone())).collect();
        serde_json::from_value::<ServerDescriptor>(Value::Object(single))
            .err()
            .map(|_| key.clone())
    })
}

/// Deserialize a server list entry by entry.
///
/// One malformed entry never hides the others; see
/// [`ServerDescriptor::from_value`]. Unnamed invalid entries are labelled
/// by position.
pub fn deserialize_servers<'de, D>(deserializer: D) -> Result<Vec<ServerDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let mut descriptor = ServerDescriptor::from_value(raw);
            if descriptor.is_invalid() && descriptor.label().is_empty() {
                descriptor.name = format!("mcp_servers[{}]", index);
            }
            descriptor
        })
        .collect())
}

impl ServerDescriptor {
    fn base(name: impl Into<String>, transport: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: transport.into(),
            enabled: true,
            command: Vec::new(),
            env: Value::Null,
            cwd: None,
            url: None,
            headers: Value::Null,
            params: Value::Null,
            auth: None,
            timeout_secs: default_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            enabled_tools: Vec::new(),
            disabled_tools: Vec::new(),
            invalid: None,
        }
    }

    /// Read one `mcp_servers` entry.
    ///
    /// An entry that does not fit the descriptor shape still produces a
    /// descriptor, carrying the reason, so it keeps its slot in the report.
    pub fn from_value(raw: Value) -> Self {
        let error = match serde_json::from_value::<Self>(raw.clone()) {
            Ok(descriptor) => return descriptor,
            Err(e) => e,
        };

        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let mut descriptor = Self::base(text("name"), text("transport"));
        descriptor.invalid = Some(match invalid_field(&raw) {
            Some(field) => format!("has invalid '{}': {}", field, error),
            None => format!("is not a valid server entry: {}", error),
        });
        descriptor
    }

    /// Whether the entry could not be read.
    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }

    /// Create a stdio descriptor from an executable and its arguments.
    pub fn stdio(
        name: impl Into<String>,
        command: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut descriptor = Self::base(name, "stdio");
        descriptor.command = command.into_iter().map(Into::into).collect();
        descriptor
    }

    /// Create an SSE descriptor.
    pub fn sse(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut descriptor = Self::base(name, "sse");
        descriptor.url = Some(url.into());
        descriptor
    }

    /// Create a streamable HTTP descriptor.
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        let mut descriptor = Self::base(name, "streamable_http");
        descriptor.url = Some(url.into());
        descriptor
    }

    /// Create a descriptor with an arbitrary transport name.
    pub fn with_transport(name: impl Into<String>, transport: impl Into<String>) -> Self {
        Self::base(name, transport)
    }

    /// Set the child environment mapping.
    pub fn with_env(mut self, env: Value) -> Self {
        self.env = env;
        self
    }

    /// Set working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set request headers.
    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = headers;
        self
    }

    /// Set query parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Set the auth block.
    pub fn with_auth(mut self, auth: AuthSpec) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the open/discovery timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set enabled tools.
    pub fn with_enabled_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.enabled_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set disabled tools.
    pub fn with_disabled_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.disabled_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Disable the server.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Label for logs; falls back to the transport when no name was given.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.transport
        } else {
            &self.name
        }
    }

    /// Tool filter derived from the enabled/disabled lists.
    pub fn tool_filter(&self) -> ToolFilter {
        ToolFilter {
            enabled: self.enabled_tools.clone(),
            disabled: self.disabled_tools.clone(),
        }
    }
}

/// Declarative authentication block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSpec {
    /// `bearer`, `api_key` or `basic`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Variable holding the bearer token.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Variable holding the API key.
    #[serde(default)]
    pub key_env: Option<String>,

    /// Header carrying the API key.
    #[serde(default)]
    pub header: Option<String>,

    /// Variable holding the basic-auth username.
    #[serde(default)]
    pub username_env: Option<String>,

    /// Variable holding the basic-auth password.
    #[serde(default)]
    pub password_env: Option<String>,
}

impl AuthSpec {
    /// Bearer token read from `token_env`.
    pub fn bearer(token_env: impl Into<String>) -> Self {
        Self {
            kind: "bearer".to_string(),
            token_env: Some(token_env.into()),
            ..Default::default()
        }
    }

    /// API key read from `key_env`, sent in `header` (default `X-API-Key`).
    pub fn api_key(key_env: impl Into<String>, header: Option<String>) -> Self {
        Self {
            kind: "api_key".to_string(),
            key_env: Some(key_env.into()),
            header,
            ..Default::default()
        }
    }

    /// Basic auth read from two variables.
    pub fn basic(username_env: impl Into<String>, password_env: impl Into<String>) -> Self {
        Self {
            kind: "basic".to_string(),
            username_env: Some(username_env.into()),
            password_env: Some(password_env.into()),
            ..Default::default()
        }
    }
}

/// Transport kind for MCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Child process speaking over stdin/stdout.
    Stdio,

    /// Server-Sent Events stream plus POST endpoint.
    Sse,

    /// Streamable HTTP (`http` is accepted as an alias).
    StreamableHttp,
}

impl TransportKind {
    /// Parse a configured transport name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "stdio" => Some(Self::Stdio),
            "sse" => Some(Self::Sse),
            "streamable_http" | "http" => Some(Self::StreamableHttp),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Sse => write!(f, "sse"),
            Self::StreamableHttp => write!(f, "streamable_http"),
        }
    }
}

/// Enabled/disabled tool lists for one server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
}

impl ToolFilter {
    /// Check if a tool is enabled.
    pub fn allows(&self, tool_name: &str) -> bool {
        if self.disabled.iter().any(|t| t == tool_name) {
            return false;
        }
        self.enabled.is_empty() || self.enabled.iter().any(|t| t == tool_name)
    }
}

/// Resolved stdio launch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioParams {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

/// Resolved SSE parameters.
///
/// `headers` are resolved for diagnostics only; this transport does not
/// forward custom headers. `params` are likewise inert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseParams {
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

/// Resolved streamable HTTP parameters.
///
/// `params` are resolved and kept but never sent: whether they belong in the
/// query string is undecided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpParams {
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

/// Transport-specific resolved parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTransport {
    Stdio(StdioParams),
    Sse(SseParams),
    StreamableHttp(HttpParams),
}

impl ResolvedTransport {
    /// Transport kind of these parameters.
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Stdio(_) => TransportKind::Stdio,
            Self::Sse(_) => TransportKind::Sse,
            Self::StreamableHttp(_) => TransportKind::StreamableHttp,
        }
    }
}

/// A descriptor with every indirection replaced by a literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedServerDescriptor {
    pub name: String,
    pub transport: ResolvedTransport,
    pub timeout: Duration,
    pub tool_timeout: Duration,
    pub filter: ToolFilter,
}
