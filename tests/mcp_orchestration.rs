// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end tests driving real stdio MCP servers written in sh.

#![cfg(unix)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use agentcli::config::load_config;
use agentcli::mcp::{
    load_mcp_tools_with, LifecycleManager, McpError, OutcomeKind, ServerDescriptor,
    TransportFactory,
};

/// Minimal MCP server: serves the tools named in its arguments, plus
/// `$TOOL_NAME` when set. Responds to the request id found in each line.
const SERVER_SCRIPT: &str = r##"
[ -n "$TOOL_NAME" ] && set -- "$@" "$TOOL_NAME"
tools=""
for t in "$@"; do
  [ -n "$tools" ] && tools="$tools,"
  tools="$tools{\"name\":\"$t\",\"description\":\"$t tool\",\"inputSchema\":{\"type\":\"object\"}}"
done
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      echo 'server starting'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2025-03-26","capabilities":{"tools":{}},"serverInfo":{"name":"script","version":"0.1.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[%s]}}\n' "$id" "$tools" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok from %s"}]}}\n' "$id" "$1" ;;
  esac
done
"##;

/// Server whose tool call never finishes; it touches `$MARKER` once the
/// call has arrived.
const STUCK_SERVER_SCRIPT: &str = r##"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2025-03-26","capabilities":{"tools":{}},"serverInfo":{"name":"stuck","version":"0.1.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"wait","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      touch "$MARKER"
      sleep 60 ;;
  esac
done
"##;

fn wait_until(limit: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if ready() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn write_server(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("server.sh");
    std::fs::write(&path, SERVER_SCRIPT).unwrap();
    path
}

fn script_server(name: &str, script: &PathBuf, tools: &[&str]) -> ServerDescriptor {
    let mut command = vec!["sh".to_string(), script.display().to_string()];
    command.extend(tools.iter().map(|t| t.to_string()));
    ServerDescriptor::stdio(name, command).with_timeout(10)
}

fn manager_with_env(vars: &[(&str, &str)]) -> LifecycleManager {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    LifecycleManager::with_connector(Arc::new(TransportFactory::with_env(Arc::new(env))))
}

#[tokio::test]
async fn test_mixed_batch_isolates_failures() {
    let dir = TempDir::new().unwrap();
    let script = write_server(&dir);

    let descriptors = vec![
        script_server("alpha", &script, &["read", "write"]),
        ServerDescriptor::stdio("ghost", ["definitely-not-a-real-binary-4e1f"]),
        ServerDescriptor::with_transport("odd", "websocket"),
        script_server("beta", &script, &["search"]),
    ];

    let toolset = load_mcp_tools_with(&descriptors, manager_with_env(&[]))
        .await
        .unwrap();

    let outcomes: Vec<_> = toolset.report.entries.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            OutcomeKind::Opened,
            OutcomeKind::Failed,
            OutcomeKind::Skipped,
            OutcomeKind::Opened
        ]
    );
    assert_eq!(toolset.closer.live_count().await, 2);

    let provenance: Vec<_> = toolset
        .tools()
        .map(|t| format!("{}/{}", t.server, t.name))
        .collect();
    assert_eq!(provenance, vec!["alpha/read", "alpha/write", "beta/search"]);

    toolset.closer.close().await;
    assert_eq!(toolset.closer.live_count().await, 0);
}

#[tokio::test]
async fn test_env_indirection_reaches_child() {
    let dir = TempDir::new().unwrap();
    let script = write_server(&dir);

    let descriptor = script_server("gamma", &script, &["base"])
        .with_env(json!({ "TOOL_NAME_env": "AGENTCLI_IT_TOOL" }));
    let toolset = load_mcp_tools_with(
        &[descriptor],
        manager_with_env(&[("AGENTCLI_IT_TOOL", "from_env")]),
    )
    .await
    .unwrap();

    let names: Vec<_> = toolset.tools().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["base", "from_env"]);
    toolset.closer.close().await;
}

#[tokio::test]
async fn test_call_and_close_lifecycle() {
    let dir = TempDir::new().unwrap();
    let script = write_server(&dir);

    let toolset = load_mcp_tools_with(
        &[script_server("alpha", &script, &["read"])],
        manager_with_env(&[]),
    )
    .await
    .unwrap();

    let wrapper = toolset.wrappers().remove(0);
    assert_eq!(wrapper.qualified_name(), "mcp__alpha__read");
    let result = wrapper.call(json!({ "path": "/tmp" })).await.unwrap();
    assert!(!result.is_error);
    assert_eq!(result.as_text(), "ok from read");

    toolset.closer.close().await;
    toolset.closer.close().await;
    assert!(toolset.closer.is_closed().await);

    assert!(matches!(
        wrapper.call(json!({})).await,
        Err(McpError::StaleRegistry)
    ));
    assert!(matches!(
        toolset.closer.reload(&[]).await,
        Err(McpError::LifecycleClosed)
    ));
}

#[tokio::test]
async fn test_config_file_to_tools() {
    let dir = TempDir::new().unwrap();
    let script = write_server(&dir);

    let yaml = format!(
        r#"
name: demo
mcp_servers:
  - name: files
    transport: stdio
    command: ["sh", "{script}", "list_dir"]
  - name: remote
    transport: sse
  - name: off
    transport: stdio
    command: ["sh", "{script}", "hidden"]
    enabled: false
  - name: typo
    transport: stdio
    command: ["sh", "{script}", "never"]
    timeout_secs: soon
"#,
        script = script.display()
    );
    std::fs::write(dir.path().join(".agent.yaml"), yaml).unwrap();

    let config = load_config(dir.path()).unwrap();
    assert_eq!(config.mcp_servers.len(), 4);

    let toolset = load_mcp_tools_with(&config.mcp_servers, manager_with_env(&[]))
        .await
        .unwrap();
    assert_eq!(toolset.report.opened(), 1);
    assert_eq!(toolset.report.skipped(), 3);
    assert_eq!(toolset.report.failed(), 0);
    let typo = &toolset.report.entries[3];
    assert_eq!(typo.name, "typo");
    assert!(typo.reason.as_deref().unwrap().contains("timeout_secs"));

    let names: Vec<_> = toolset.tools().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["list_dir"]);
    toolset.closer.close().await;
}

#[test]
fn test_interrupt_ends_running_call() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("stuck.sh");
    std::fs::write(&script, STUCK_SERVER_SCRIPT).unwrap();
    let marker = dir.path().join("called");

    let yaml = format!(
        r#"
mcp_servers:
  - name: stuck
    transport: stdio
    command: ["sh", "{script}"]
    env:
      MARKER: "{marker}"
"#,
        script = script.display(),
        marker = marker.display()
    );
    std::fs::write(dir.path().join(".agent.yaml"), yaml).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_agentcli"))
        .args(["call", "wait"])
        .current_dir(dir.path())
        .env_remove("AGENTCLI_CONFIG")
        .env_remove("AGENTCLI_ENV_FILE")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    if !wait_until(Duration::from_secs(20), || marker.exists()) {
        let _ = child.kill();
        panic!("tool call never reached the server");
    }

    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let mut exit = None;
    let exited = wait_until(Duration::from_secs(10), || {
        exit = child.try_wait().unwrap();
        exit.is_some()
    });
    if !exited {
        let _ = child.kill();
        panic!("agentcli kept running after SIGINT");
    }
    assert_eq!(exit.and_then(|s| s.code()), Some(130));
}
