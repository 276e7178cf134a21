//! `dankcord-config` — DankCord runtime configuration.
//!
//! Provides:
//! - Typed config schema
//! - YAML loading from the platform config directory
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config_value};
pub use redact::redact;
pub use schema::{DankConfig, ResourceIntensivity};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
/// A config with validation errors is rejected.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<DankConfig> {
    let (config, report) = load_with_report(path).await?;
    if let Some(first) = report.errors.first() {
        bail!(
            "Invalid config at {} ({} error(s)): {first}",
            path.display(),
            report.errors.len()
        );
    }
    Ok(config)
}

/// Like [`load_and_prepare`], but hands back the validation report instead of
/// rejecting an invalid config.
pub async fn load_with_report(path: &Path) -> Result<(DankConfig, ValidationReport)> {
    let value = load_config_value(path).await?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    prepare(value)
}

/// Env substitution against an explicit environment, then [`prepare`].
pub fn prepare_with_env(
    value: &Value,
    env: &HashMap<String, String>,
) -> Result<(DankConfig, ValidationReport)> {
    let value = resolve_env_vars_with(value, env).context("Failed to resolve env vars in config")?;
    prepare(value)
}

fn prepare(value: Value) -> Result<(DankConfig, ValidationReport)> {
    let config: DankConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    Ok((config, report))
}
