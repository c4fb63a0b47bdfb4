// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the agentcli toolkit.
//!
//! This module provides strongly-typed errors for configuration handling,
//! using `thiserror` for ergonomic error definitions. The binary wraps them
//! with `anyhow` context at the top level.
//! Errors raised while talking to tool servers live in [`crate::mcp::McpError`].

use thiserror::Error;

/// Errors that can occur during configuration loading and resolution.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// A strictly-resolved indirection named an unset environment variable.
    #[error("Environment variable '{var}' referenced by '{key}' is not set")]
    MissingEnvVar { key: String, var: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create a missing environment variable error.
    pub fn missing_env(key: impl Into<String>, var: impl Into<String>) -> Self {
        Self::MissingEnvVar {
            key: key.into(),
            var: var.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_missing_env_display() {
        let err = ConfigError::missing_env("api_key_env", "OPENAI_API_KEY");
        let display = err.to_string();
        assert!(display.contains("OPENAI_API_KEY"));
        assert!(display.contains("api_key_env"));
    }
}
