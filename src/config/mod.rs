// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for agent projects.
//!
//! Handles loading `.agent.yaml`, overlaying `.env` files on the process
//! environment, and resolving environment indirections (`*_env` keys) in
//! either strict or lenient mode.

mod env;
mod loader;
mod types;

pub use env::{
    resolve_env, resolve_lenient, resolve_with, to_string_map, EnvSource, LayeredEnv, ProcessEnv,
    ResolveMode, ENV_SUFFIX,
};

pub use loader::{
    find_workspace_root, load_config_file, load_env_file, load_workspace_config, CONFIG_FILES,
    ENV_FILE,
};

pub use types::AgentConfig;

use crate::error::ConfigError;
use std::path::Path;

/// Load the workspace config, or an empty one when no file exists.
///
/// This is the main entry point for configuration loading.
pub fn load_config(workspace_root: &Path) -> Result<AgentConfig, ConfigError> {
    Ok(load_workspace_config(workspace_root)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_no_files() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).unwrap();
        assert!(config.mcp_servers.is_empty());
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".agent.yaml"), "mcp_servers: [unterminated").unwrap();
        let result = load_config(temp.path());
        assert!(matches!(result, Err(ConfigError::YamlError(_))));
    }
}
