// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files.
//!
//! Handles loading the project's `.agent.yaml` (YAML or JSON) and optional
//! `.env` files whose values overlay the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;

use super::types::AgentConfig;

/// Config file names to search for (in order).
pub const CONFIG_FILES: &[&str] = &[".agent.yaml", ".agent.yml", ".agent.json"];

/// Default env file name.
pub const ENV_FILE: &str = ".env";

/// Load a configuration file (JSON or YAML).
pub fn load_config_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    debug!(path = %path.display(), "Loading agent config");

    match extension.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content).map_err(ConfigError::from),
        _ => serde_yaml::from_str(&content).map_err(ConfigError::from),
    }
}

/// Load the workspace configuration from `workspace_root`, if present.
pub fn load_workspace_config(workspace_root: &Path) -> Result<Option<AgentConfig>, ConfigError> {
    for filename in CONFIG_FILES {
        let path = workspace_root.join(filename);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Find the workspace root by searching for config files.
///
/// Walks up the directory tree from `start` until it finds a directory
/// containing a config file or reaches the filesystem root.
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if CONFIG_FILES.iter().any(|f| current.join(f).exists()) {
            return Some(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Load `KEY=VALUE` pairs from an env file.
///
/// Blank lines and `#` comments are skipped; lines without `=` are reported
/// and skipped. Keys and values are trimmed, an `export ` prefix is dropped,
/// and a value wrapped in matching quotes is unwrapped.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_env(&content, path))
}

fn parse_env(content: &str, path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!(path = %path.display(), line = index + 1, "Invalid env file line, skipping");
            continue;
        };

        let key = key.trim();
        let key = key.strip_prefix("export ").map(str::trim).unwrap_or(key);
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    vars
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
