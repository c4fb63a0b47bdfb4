// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentcli entry point: inspect and exercise a project's MCP servers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{json, Value};

use agentcli::config::{self, AgentConfig, LayeredEnv, ProcessEnv, ENV_FILE};
use agentcli::mcp::{
    install_shutdown_hook, load_mcp_tools_with, LifecycleManager, McpToolset, OutcomeKind,
    TransportFactory,
};
use agentcli::telemetry::{init_telemetry, TelemetryConfig};

/// agentcli - connect to MCP servers and list their tools.
#[derive(Parser)]
#[command(name = "agentcli")]
#[command(author, version, about = "Multi-transport MCP client", long_about = None)]
struct Cli {
    /// Config file (defaults to .agent.yaml in the workspace)
    #[arg(short, long, env = "AGENTCLI_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Env file overlaid on the process environment (defaults to .env)
    #[arg(long, env = "AGENTCLI_ENV_FILE", global = true)]
    env_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print collected metrics before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for agentcli.
#[derive(Subcommand)]
enum Commands {
    /// List configured servers without connecting
    Servers {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to every server and print the open report
    Check {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect to every server and list discovered tools
    Tools {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Call one tool by name
    Call {
        /// Tool name, plain or qualified (mcp__server__tool)
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig::from_verbosity(cli.verbose))
        .context("failed to initialize logging")?;

    let workspace = std::env::current_dir()?;
    let workspace = config::find_workspace_root(&workspace).unwrap_or(workspace);
    let agent_config = load_agent_config(&workspace, cli.config.as_deref())?;
    let overlay = load_overlay(&workspace, cli.env_file.as_deref())?;

    let result = match cli.command {
        Commands::Servers { json } => print_servers(&agent_config, json),
        Commands::Check { json } => {
            let toolset = open(&agent_config, overlay).await?;
            let result = print_report(&toolset, json);
            toolset.closer.close().await;
            result
        }
        Commands::Tools { json } => {
            let toolset = open(&agent_config, overlay).await?;
            let result = print_tools(&toolset, json);
            toolset.closer.close().await;
            result
        }
        Commands::Call { tool, args } => {
            let arguments: Value =
                serde_json::from_str(&args).context("--args must be a JSON value")?;
            let toolset = open(&agent_config, overlay).await?;
            let result = call_tool(&toolset, &tool, arguments).await;
            toolset.closer.close().await;
            result
        }
    };

    if cli.metrics {
        print_metrics();
    }

    result
}

fn load_agent_config(workspace: &Path, path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    match path {
        Some(path) => config::load_config_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => config::load_config(workspace).context("failed to load workspace config"),
    }
}

fn load_overlay(workspace: &Path, path: Option<&Path>) -> anyhow::Result<HashMap<String, String>> {
    match path {
        Some(path) => config::load_env_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let default = workspace.join(ENV_FILE);
            if default.exists() {
                config::load_env_file(&default)
                    .with_context(|| format!("failed to load {}", default.display()))
            } else {
                Ok(HashMap::new())
            }
        }
    }
}

async fn open(
    agent_config: &AgentConfig,
    overlay: HashMap<String, String>,
) -> anyhow::Result<McpToolset> {
    let env = Arc::new(LayeredEnv::new(overlay, ProcessEnv));
    let factory = TransportFactory::with_env(env);
    let manager = LifecycleManager::with_connector(Arc::new(factory));

    let toolset = load_mcp_tools_with(&agent_config.mcp_servers, manager).await?;
    install_shutdown_hook(toolset.closer.clone());
    Ok(toolset)
}

fn print_servers(agent_config: &AgentConfig, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&agent_config.mcp_servers)?);
        return Ok(());
    }

    if agent_config.mcp_servers.is_empty() {
        println!("{}", "No MCP servers configured".dimmed());
        return Ok(());
    }

    for server in &agent_config.mcp_servers {
        let target = match (&server.url, server.command.first()) {
            (Some(url), _) => url.clone(),
            (None, Some(_)) => server.command.join(" "),
            (None, None) => String::new(),
        };
        let status = if server.is_invalid() {
            "invalid".red()
        } else if server.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        println!(
            "{} [{}] {} {}",
            server.label().bright_white().bold(),
            server.transport.cyan(),
            status,
            target.dimmed()
        );
        if let Some(reason) = &server.invalid {
            println!("  {}", reason.dimmed());
        }
    }
    Ok(())
}

fn print_report(toolset: &McpToolset, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&toolset.report)?);
        return Ok(());
    }

    for entry in &toolset.report.entries {
        let outcome = match entry.outcome {
            OutcomeKind::Opened => "opened".green(),
            OutcomeKind::Skipped => "skipped".yellow(),
            OutcomeKind::Failed => "failed".red(),
        };
        print!("{} [{}] {}", entry.name.bright_white(), entry.transport.cyan(), outcome);
        match &entry.reason {
            Some(reason) => println!(": {}", reason.dimmed()),
            None => println!(),
        }
    }
    println!("\n{}", toolset.report.to_string().bold());
    Ok(())
}

fn print_tools(toolset: &McpToolset, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let tools: Vec<Value> = toolset
            .tools()
            .map(|t| {
                json!({
                    "name": t.name,
                    "qualified_name": t.qualified_name(),
                    "server": t.server,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    if toolset.registry.is_empty() {
        println!("{}", "No tools discovered".dimmed());
    }
    for tool in toolset.tools() {
        let mut markers = Vec::new();
        if tool.read_only {
            markers.push("read-only");
        }
        if tool.destructive {
            markers.push("destructive");
        }
        println!(
            "{} {} {}",
            tool.qualified_name().bright_white(),
            tool.description.as_deref().unwrap_or("").dimmed(),
            if markers.is_empty() {
                String::new()
            } else {
                format!("({})", markers.join(", ")).yellow().to_string()
            }
        );
    }

    for (name, servers) in toolset.registry.duplicate_names() {
        println!(
            "{} '{}' is offered by {}",
            "warning:".yellow().bold(),
            name,
            servers.join(", ")
        );
    }
    println!("\n{} tools from {}", toolset.registry.len(), toolset.report);
    Ok(())
}

async fn call_tool(toolset: &McpToolset, name: &str, arguments: Value) -> anyhow::Result<()> {
    let wrapper = toolset
        .wrappers()
        .into_iter()
        .find(|w| w.info().name == name || w.qualified_name() == name)
        .with_context(|| format!("no discovered tool named '{}'", name))?;

    let result = wrapper.call(arguments).await?;
    if result.is_error {
        eprintln!("{} {}", "tool error:".red().bold(), result.as_text());
    } else {
        println!("{}", result.as_text());
    }
    Ok(())
}

#[cfg(feature = "telemetry")]
fn print_metrics() {
    let snapshot = agentcli::telemetry::GLOBAL_METRICS.snapshot();
    eprintln!("{}", snapshot.summary().dimmed());
}

#[cfg(not(feature = "telemetry"))]
fn print_metrics() {
    eprintln!("{}", "metrics require the `telemetry` feature".dimmed());
}
