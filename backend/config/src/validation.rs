//! Config validation with user-friendly error messages.

use crate::schema::DankConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// Everything found wrong with a config in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &DankConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_identity(config, &mut report);
    validate_timing(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_identity(config: &DankConfig, report: &mut ValidationReport) {
    if config.token.trim().is_empty() {
        report.error("token", "No token provided");
    }
    if config.channel_id == 0 {
        report.error("channel_id", "No channel_id provided");
    }
    if config.command_prefix().trim().is_empty() {
        report.error("command_prefix", "Command prefix cannot be empty");
    }
    if let Some(id) = &config.self_user_id {
        if id.parse::<u64>().is_err() {
            report.warn("self_user_id", format!("'{id}' is not a numeric user id"));
        }
    }
}

fn validate_timing(config: &DankConfig, report: &mut ValidationReport) {
    if config.reply_timeout_secs == Some(0) {
        report.error("reply_timeout_secs", "reply_timeout_secs must be >= 1");
    }
    if config.janitor_interval_secs == Some(0) {
        report.error("janitor_interval_secs", "janitor_interval_secs must be >= 1");
    }
    if config.stale_after() < config.reply_timeout() {
        report.warn(
            "stale_after_secs",
            "Entries may expire before their reply timeout; raise stale_after_secs",
        );
    }
}

fn validate_logging(config: &DankConfig, report: &mut ValidationReport) {
    let level = config.log_level();
    if !matches!(
        level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) && !level.contains('=')
    {
        report.warn(
            "log_level",
            format!("Unknown log level '{level}'; expected trace, debug, info, warn or error"),
        );
    }
}
