// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Environment-variable indirection over nested configuration values.
//!
//! A mapping key ending in [`ENV_SUFFIX`] whose value is a string names an
//! environment variable. Resolution replaces the entry with the stripped key
//! bound to that variable's content:
//!
//! ```text
//! { "api_key_env": "OPENAI_API_KEY" }  =>  { "api_key": "<contents of $OPENAI_API_KEY>" }
//! ```
//!
//! The walk recurses through mappings and sequences; scalars pass through.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ConfigError;

/// Reserved key suffix marking an environment indirection.
pub const ENV_SUFFIX: &str = "_env";

/// How to treat an indirection whose variable is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Unset variable is a configuration error.
    Strict,
    /// Unset variable logs a warning and the key is dropped.
    #[default]
    Lenient,
}

/// Source of environment variable values.
pub trait EnvSource: Send + Sync {
    /// Look up a variable, `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Values from a `.env` file layered over another source.
#[derive(Debug, Clone)]
pub struct LayeredEnv<S> {
    overlay: HashMap<String, String>,
    base: S,
}

impl<S: EnvSource> LayeredEnv<S> {
    /// Create a layered source; `overlay` wins over `base`.
    pub fn new(overlay: HashMap<String, String>, base: S) -> Self {
        Self { overlay, base }
    }
}

impl<S: EnvSource> EnvSource for LayeredEnv<S> {
    fn var(&self, name: &str) -> Option<String> {
        self.overlay.get(name).cloned().or_else(|| self.base.var(name))
    }
}

/// Resolve indirections against the process environment.
pub fn resolve_env(value: &Value, mode: ResolveMode) -> Result<Value, ConfigError> {
    resolve_with(value, mode, &ProcessEnv)
}

/// Resolve indirections against an explicit environment source.
pub fn resolve_with(
    value: &Value,
    mode: ResolveMode,
    env: &dyn EnvSource,
) -> Result<Value, ConfigError> {
    match value {
        Value::Object(map) => resolve_map(map, mode, env).map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_with(item, mode, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other.clone()),
    }
}

/// Lenient resolution never fails; this is the form tool-server fields use.
pub fn resolve_lenient(value: &Value, env: &dyn EnvSource) -> Value {
    resolve_with(value, ResolveMode::Lenient, env).unwrap_or_else(|_| value.clone())
}

fn resolve_map(
    map: &Map<String, Value>,
    mode: ResolveMode,
    env: &dyn EnvSource,
) -> Result<Map<String, Value>, ConfigError> {
    let mut resolved = Map::with_capacity(map.len());

    for (key, value) in map {
        match (indirection_target(key), value) {
            (Some(target), Value::String(var)) => match env.var(var) {
                Some(content) => {
                    resolved.insert(target.to_string(), Value::String(content));
                }
                None => match mode {
                    ResolveMode::Strict => return Err(ConfigError::missing_env(key, var)),
                    ResolveMode::Lenient => {
                        warn!(key = %key, var = %var, "Environment variable not set, omitting '{}'", target);
                    }
                },
            },
            _ => {
                resolved.insert(key.clone(), resolve_with(value, mode, env)?);
            }
        }
    }

    Ok(resolved)
}

/// Strip the indirection suffix, if `key` is an indirection key.
fn indirection_target(key: &str) -> Option<&str> {
    key.strip_suffix(ENV_SUFFIX).filter(|target| !target.is_empty())
}

/// Flatten a resolved mapping into string pairs.
///
/// Scalars are stringified; nested values are dropped with a warning since
/// headers, params and child environments are flat.
pub fn to_string_map(value: &Value, field: &str) -> HashMap<String, String> {
    let Some(map) = value.as_object() else {
        if !value.is_null() {
            warn!(field = %field, "Expected a mapping, ignoring value");
        }
        return HashMap::new();
    };

    map.iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key.clone(), s.clone())),
            Value::Number(n) => Some((key.clone(), n.to_string())),
            Value::Bool(b) => Some((key.clone(), b.to_string())),
            Value::Null => None,
            _ => {
                warn!(field = %field, key = %key, "Ignoring non-scalar value");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lenient_missing_var_omits_key() {
        let value = json!({ "api_key_env": "FOO" });
        let resolved = resolve_with(&value, ResolveMode::Lenient, &env(&[])).unwrap();
        assert_eq!(resolved, json!({}));
    }

    #[test]
    fn test_strict_missing_var_errors() {
        let value = json!({ "api_key_env": "FOO" });
        let err = resolve_with(&value, ResolveMode::Strict, &env(&[])).unwrap_err();
        match err {
            ConfigError::MissingEnvVar { key, var } => {
                assert_eq!(key, "api_key_env");
                assert_eq!(var, "FOO");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolves_present_var() {
        let value = json!({ "api_key_env": "FOO", "model": "gpt-4" });
        let resolved = resolve_with(&value, ResolveMode::Strict, &env(&[("FOO", "secret")])).unwrap();
        assert_eq!(resolved, json!({ "api_key": "secret", "model": "gpt-4" }));
    }

    #[test]
    fn test_nested_mappings_and_sequences() {
        let value = json!({
            "servers": [
                { "headers": { "X-Token_env": "TOKEN" } },
                { "headers": { "X-Missing_env": "NOPE" } }
            ],
            "count": 3
        });
        let resolved =
            resolve_with(&value, ResolveMode::Lenient, &env(&[("TOKEN", "t0k")])).unwrap();
        assert_eq!(
            resolved,
            json!({
                "servers": [
                    { "headers": { "X-Token": "t0k" } },
                    { "headers": {} }
                ],
                "count": 3
            })
        );
    }

    #[test]
    fn test_scalars_pass_through() {
        for value in [json!("text"), json!(42), json!(true), Value::Null] {
            assert_eq!(resolve_lenient(&value, &env(&[])), value);
        }
    }

    #[test]
    fn test_bare_suffix_and_non_string_are_not_indirections() {
        let value = json!({ "_env": "FOO", "retries_env": 3 });
        let resolved = resolve_lenient(&value, &env(&[("FOO", "x")]));
        assert_eq!(resolved, value);
    }

    #[test]
    fn test_layered_env_prefers_overlay() {
        let layered = LayeredEnv::new(env(&[("A", "overlay")]), env(&[("A", "base"), ("B", "base")]));
        assert_eq!(layered.var("A").as_deref(), Some("overlay"));
        assert_eq!(layered.var("B").as_deref(), Some("base"));
        assert_eq!(layered.var("C"), None);
    }

    #[test]
    fn test_to_string_map() {
        let value = json!({ "a": "x", "b": 2, "c": true, "d": null, "e": { "f": 1 } });
        let map = to_string_map(&value, "headers");
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
        assert_eq!(map.get("c").map(String::as_str), Some("true"));
        assert!(to_string_map(&Value::Null, "headers").is_empty());
    }
}
