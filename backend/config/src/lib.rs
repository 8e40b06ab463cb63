//! `worldsync-config`: runtime configuration management.
//!
//! Provides:
//! - Typed config schema (server, logging)
//! - YAML loading
//! - `${ENV_VAR}` substitution and `WORLDSYNC_*` overrides
//! - Default value application
//! - Validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{
    apply_env_overrides, apply_env_overrides_with, collect_referenced_vars, resolve_env_vars,
    resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::{LoggingConfig, ServerConfig, WorldSyncConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load, substitute env vars, and apply overrides and defaults.
///
/// This is the main entry point for loading a config at runtime. It does not
/// validate; call [`check`] once logging is up and every override is applied.
pub async fn load_and_prepare(path: &Path) -> Result<WorldSyncConfig> {
    let raw_config = load_config(path).await?;

    let value: Value = serde_json::to_value(&raw_config)
        .context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).with_context(|| {
        format!(
            "Failed to resolve env vars in config (references: {})",
            collect_referenced_vars(&value).join(", ")
        )
    })?;
    let config: WorldSyncConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config)?;
    Ok(apply_all_defaults(config))
}

/// Log the validation report and fail on the first error.
pub fn check(config: &WorldSyncConfig) -> Result<()> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }
    Ok(())
}
