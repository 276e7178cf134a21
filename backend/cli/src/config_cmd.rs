//! `dankcord check-config`: load a config file and print its validation report.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use dankcord_config::{
    collect_referenced_vars, config_dir, config_file_path, load_config_value, load_with_report,
    redact, DankConfig,
};

use crate::terminal_output::{note_error, note_info, note_success, note_warn, render_pairs};

/// Explicit path, else the platform default location.
pub fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| config_file_path(&config_dir()))
}

pub async fn run(path: Option<PathBuf>) -> Result<()> {
    let path = resolve_path(path);
    note_info(&format!("Checking {}", path.display()));

    let vars = collect_referenced_vars(&load_config_value(&path).await?);
    if !vars.is_empty() {
        note_info(&format!("References env vars: {}", vars.join(", ")));
    }

    let (config, report) = load_with_report(&path).await?;
    println!("{}", render_pairs(&summary_rows(&config)?));

    for warning in &report.warnings {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }

    if !report.is_valid() {
        bail!("{} has {} error(s)", display(&path), report.errors.len());
    }
    note_success("Config is valid");
    Ok(())
}

/// Effective settings with credentials masked.
fn summary_rows(config: &DankConfig) -> Result<Vec<(&'static str, String)>> {
    let masked = redact(&serde_json::to_value(config)?);
    let token = masked["token"].as_str().unwrap_or_default().to_string();
    Ok(vec![
        ("token", token),
        ("channel_id", config.channel_id.to_string()),
        ("dm_mode", config.dm_mode.to_string()),
        (
            "resource_intensivity",
            format!("{:?}", config.resource_intensivity()).to_uppercase(),
        ),
        (
            "self_user_id",
            config.self_user_id.clone().unwrap_or_else(|| "-".into()),
        ),
        ("command_prefix", config.command_prefix().to_string()),
        ("reply_timeout", format!("{}s", config.reply_timeout().as_secs())),
        ("stale_after", format!("{}s", config.stale_after().as_secs())),
        ("janitor_interval", format!("{}s", config.janitor_interval().as_secs())),
        ("log_level", config.log_level().to_string()),
        (
            "log_dir",
            config.log_dir().map(display).unwrap_or_else(|| "-".into()),
        ),
    ])
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
