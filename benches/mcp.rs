// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks for the MCP module.
//!
//! These benchmarks measure:
//! - Descriptor parsing
//! - Environment indirection resolution
//! - Descriptor resolution through the transport factory
//! - JSON-RPC and event-stream parsing

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;

use agentcli::config::{resolve_with, AgentConfig, ResolveMode};
use agentcli::mcp::transport::jsonrpc::{find_response, parse_event_stream};
use agentcli::mcp::{resolve_auth, AuthSpec, McpToolInfo, ServerDescriptor, TransportFactory};

fn env() -> HashMap<String, String> {
    [
        ("GH_TOKEN", "ghp_0123456789"),
        ("SEARCH_TOKEN", "tok"),
        ("TENANT", "acme"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Benchmark `.agent.yaml` parsing.
fn bench_config_parsing(c: &mut Criterion) {
    let yaml = r#"
name: bench
mcp_servers:
  - name: filesystem
    transport: stdio
    command: ["npx", "-y", "@modelcontextprotocol/server-filesystem", "/tmp"]
    env:
      GITHUB_TOKEN_env: GH_TOKEN
  - name: search
    transport: streamable_http
    url: https://mcp.example.com/mcp
    headers:
      X-Tenant_env: TENANT
    auth:
      type: bearer
      token_env: SEARCH_TOKEN
"#;

    c.bench_function("mcp_config_parse_yaml", |b| {
        b.iter(|| serde_yaml::from_str::<AgentConfig>(black_box(yaml)).unwrap());
    });
}

/// Benchmark indirection resolution over a nested tree.
fn bench_resolve(c: &mut Criterion) {
    let env = env();
    let value = json!({
        "provider": "openai",
        "api_key_env": "GH_TOKEN",
        "extra": {
            "headers": { "X-Tenant_env": "TENANT", "X-Static": "1" },
            "list": [{ "token_env": "SEARCH_TOKEN" }, { "missing_env": "NOPE" }]
        }
    });

    c.bench_function("mcp_resolve_lenient", |b| {
        b.iter(|| resolve_with(black_box(&value), ResolveMode::Lenient, &env).unwrap());
    });

    let spec = AuthSpec::basic("GH_TOKEN", "SEARCH_TOKEN");
    c.bench_function("mcp_resolve_auth_basic", |b| {
        b.iter(|| resolve_auth(black_box(&spec), &env));
    });
}

/// Benchmark full descriptor resolution.
fn bench_factory_resolve(c: &mut Criterion) {
    let factory = TransportFactory::with_env(Arc::new(env()));
    let stdio = ServerDescriptor::stdio("fs", ["npx", "-y", "server", "/tmp"])
        .with_env(json!({ "GITHUB_TOKEN_env": "GH_TOKEN", "NODE_ENV": "production" }));
    let http = ServerDescriptor::http("search", "https://mcp.example.com/mcp")
        .with_headers(json!({ "X-Tenant_env": "TENANT" }))
        .with_auth(AuthSpec::bearer("SEARCH_TOKEN"));

    c.bench_function("mcp_factory_resolve_stdio", |b| {
        b.iter(|| factory.resolve(black_box(&stdio)).unwrap());
    });
    c.bench_function("mcp_factory_resolve_http", |b| {
        b.iter(|| factory.resolve(black_box(&http)).unwrap());
    });
}

/// Benchmark wire parsing.
fn bench_wire(c: &mut Criterion) {
    let tools: Vec<_> = (0..50)
        .map(|i| json!({ "name": format!("tool_{}", i), "inputSchema": { "type": "object" } }))
        .collect();
    let page = json!({ "tools": tools });

    c.bench_function("mcp_tool_info_from_wire", |b| {
        b.iter(|| {
            page["tools"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(|t| McpToolInfo::from_wire(black_box(t), "bench"))
                .count()
        });
    });

    let mut body = String::new();
    for id in 1..=20 {
        body.push_str(&format!(
            "event: message\ndata: {{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":{{}}}}\n\n",
            id
        ));
    }
    c.bench_function("mcp_event_stream_parse", |b| {
        b.iter(|| {
            let messages: Vec<serde_json::Value> = parse_event_stream(black_box(&body))
                .into_iter()
                .filter_map(|e| serde_json::from_str(&e.data).ok())
                .collect();
            find_response(messages, 20)
        });
    });
}

criterion_group!(
    benches,
    bench_config_parsing,
    bench_resolve,
    bench_factory_resolve,
    bench_wire,
);
criterion_main!(benches);
