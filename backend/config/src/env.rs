//! Environment variable handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside string values, resolved at load time.
//!   Only uppercase `[A-Z_][A-Z0-9_]*` names are matched and `$${VAR}`
//!   escapes to a literal `${VAR}`.
//! - `WORLDSYNC_*` variables that override individual settings.

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::{LoggingConfig, ServerConfig, WorldSyncConfig};

/// Matches `${VAR}` and its escaped form `$${VAR}` (leading `$` in group 1).
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const ENV_HOST: &str = "WORLDSYNC_HOST";
pub const ENV_PORT: &str = "WORLDSYNC_PORT";
pub const ENV_STATIC_DIR: &str = "WORLDSYNC_STATIC_DIR";
pub const ENV_LOG_DIR: &str = "WORLDSYNC_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "WORLDSYNC_LOG_LEVEL";

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references in a config JSON value tree using the
/// process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute env vars using a provided map (useful for testing).
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Collect all env var names referenced in a config value tree (for diagnostics).
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars_recursive(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars_recursive(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            for caps in ENV_VAR_PATTERN.captures_iter(s) {
                if caps[1].is_empty() {
                    out.push(caps[2].to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_vars_recursive(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars_recursive(v, out)),
        _ => {}
    }
}

/// Apply `WORLDSYNC_*` overrides from the process environment.
pub fn apply_env_overrides(config: WorldSyncConfig) -> Result<WorldSyncConfig> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Apply `WORLDSYNC_*` overrides from a provided map.
pub fn apply_env_overrides_with(
    mut config: WorldSyncConfig,
    env: &HashMap<String, String>,
) -> Result<WorldSyncConfig> {
    let lookup = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    let server = config.server.get_or_insert_with(ServerConfig::default);
    if let Some(host) = lookup(ENV_HOST) {
        server.host = Some(host);
    }
    if let Some(port) = lookup(ENV_PORT) {
        let port = port
            .parse::<u16>()
            .with_context(|| format!("{ENV_PORT} must be a port number, got '{port}'"))?;
        server.port = Some(port);
    }
    if let Some(dir) = lookup(ENV_STATIC_DIR) {
        server.static_dir = Some(dir);
    }

    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    if let Some(dir) = lookup(ENV_LOG_DIR) {
        logging.dir = Some(dir);
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        logging.level = Some(level);
    }

    Ok(config)
}
