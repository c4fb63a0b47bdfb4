// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Auth block resolution.
//!
//! Turns a declarative [`AuthSpec`] into header and parameter contributions.
//! Missing credentials degrade the request with a warning; they never abort
//! configuration.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use super::config::AuthSpec;
use crate::config::EnvSource;

/// Default variable for bearer tokens.
pub const DEFAULT_TOKEN_ENV: &str = "BEARER_TOKEN";

/// Default variable for API keys.
pub const DEFAULT_KEY_ENV: &str = "API_KEY";

/// Default header for API keys.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

const AUTHORIZATION: &str = "Authorization";

/// Header and parameter contributions from an auth block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParts {
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
}

impl AuthParts {
    /// Whether nothing was contributed.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.params.is_empty()
    }
}

/// Resolve an auth block against `env`.
pub fn resolve_auth(spec: &AuthSpec, env: &dyn EnvSource) -> AuthParts {
    let mut parts = AuthParts::default();

    match spec.kind.as_str() {
        "bearer" => {
            let var = spec.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
            match env.var(var) {
                Some(token) => {
                    let value = if token.starts_with("Bearer ") {
                        token
                    } else {
                        format!("Bearer {}", token)
                    };
                    parts.headers.insert(AUTHORIZATION.to_string(), value);
                    debug!(var = %var, "Applied bearer auth");
                }
                None => warn!(var = %var, "Bearer token variable not set, sending no Authorization header"),
            }
        }
        "api_key" => {
            let var = spec.key_env.as_deref().unwrap_or(DEFAULT_KEY_ENV);
            let header = spec.header.as_deref().unwrap_or(DEFAULT_API_KEY_HEADER);
            match env.var(var) {
                Some(key) => {
                    parts.headers.insert(header.to_string(), key);
                    debug!(var = %var, header = %header, "Applied API key auth");
                }
                None => warn!(var = %var, "API key variable not set, sending no {} header", header),
            }
        }
        "basic" => {
            let username = spec.username_env.as_deref().and_then(|var| env.var(var));
            let password = spec.password_env.as_deref().and_then(|var| env.var(var));
            match (username, password) {
                (Some(user), Some(pass)) => {
                    let encoded = BASE64.encode(format!("{}:{}", user, pass));
                    parts
                        .headers
                        .insert(AUTHORIZATION.to_string(), format!("Basic {}", encoded));
                    debug!("Applied basic auth");
                }
                _ => warn!(
                    username_env = ?spec.username_env,
                    password_env = ?spec.password_env,
                    "Basic auth credentials incomplete, sending no Authorization header"
                ),
            }
        }
        other => warn!(auth_type = %other, "Unknown auth type (supported: bearer, api_key, basic), ignoring"),
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bearer_prefixes_token() {
        let parts = resolve_auth(&AuthSpec::bearer("TEST_TOKEN"), &env(&[("TEST_TOKEN", "abc123")]));
        assert_eq!(
            parts.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc123")
        );
        assert!(parts.params.is_empty());
    }

    #[test]
    fn test_bearer_prefix_is_idempotent() {
        let parts = resolve_auth(
            &AuthSpec::bearer("TEST_TOKEN"),
            &env(&[("TEST_TOKEN", "Bearer abc123")]),
        );
        assert_eq!(
            parts.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn test_bearer_default_variable() {
        let spec = AuthSpec {
            kind: "bearer".to_string(),
            ..Default::default()
        };
        let parts = resolve_auth(&spec, &env(&[("BEARER_TOKEN", "t")]));
        assert_eq!(parts.headers.get("Authorization").map(String::as_str), Some("Bearer t"));
    }

    #[test]
    fn test_bearer_missing_is_fail_open() {
        let parts = resolve_auth(&AuthSpec::bearer("TEST_TOKEN"), &env(&[]));
        assert!(parts.is_empty());
    }

    #[test]
    fn test_api_key_default_and_custom_header() {
        let spec = AuthSpec {
            kind: "api_key".to_string(),
            ..Default::default()
        };
        let parts = resolve_auth(&spec, &env(&[("API_KEY", "k1")]));
        assert_eq!(parts.headers.get("X-API-Key").map(String::as_str), Some("k1"));

        let spec = AuthSpec::api_key("MY_KEY", Some("X-Custom".to_string()));
        let parts = resolve_auth(&spec, &env(&[("MY_KEY", "k2")]));
        assert_eq!(parts.headers.get("X-Custom").map(String::as_str), Some("k2"));
        assert!(!parts.headers.contains_key("X-API-Key"));

        assert!(resolve_auth(&spec, &env(&[])).is_empty());
    }

    #[test]
    fn test_basic_encodes_credentials() {
        let spec = AuthSpec::basic("USER_VAR", "PASS_VAR");
        let parts = resolve_auth(&spec, &env(&[("USER_VAR", "user"), ("PASS_VAR", "pass")]));
        assert_eq!(
            parts.headers.get("Authorization").map(String::as_str),
            Some("Basic dXNlcjpwYXNz")
        );
    }

    #[test]
    fn test_basic_requires_both() {
        let spec = AuthSpec::basic("USER_VAR", "PASS_VAR");
        assert!(resolve_auth(&spec, &env(&[("USER_VAR", "user")])).is_empty());
        assert!(resolve_auth(&spec, &env(&[("PASS_VAR", "pass")])).is_empty());
    }

    #[test]
    fn test_unknown_type_contributes_nothing() {
        let spec = AuthSpec {
            kind: "oauth2".to_string(),
            ..Default::default()
        };
        assert!(resolve_auth(&spec, &env(&[("BEARER_TOKEN", "t")])).is_empty());
    }
}
