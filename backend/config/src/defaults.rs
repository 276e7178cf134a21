//! Config defaults: fills in optional fields left out of the file.

use crate::schema::{DankConfig, ResourceIntensivity};

pub const DEFAULT_COMMAND_PREFIX: &str = "pls";

/// Seconds an issued command waits for its reply.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 30;

/// Age after which an unanswered entry is expired.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 120;

pub const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 15;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: DankConfig) -> DankConfig {
    let config = apply_command_defaults(config);
    let config = apply_cache_defaults(config);
    apply_logging_defaults(config)
}

fn apply_command_defaults(mut config: DankConfig) -> DankConfig {
    config
        .command_prefix
        .get_or_insert_with(|| DEFAULT_COMMAND_PREFIX.to_string());
    config
        .reply_timeout_secs
        .get_or_insert(DEFAULT_REPLY_TIMEOUT_SECS);
    config
}

fn apply_cache_defaults(mut config: DankConfig) -> DankConfig {
    config
        .resource_intensivity
        .get_or_insert(ResourceIntensivity::Mem);
    config.stale_after_secs.get_or_insert(DEFAULT_STALE_AFTER_SECS);
    config
        .janitor_interval_secs
        .get_or_insert(DEFAULT_JANITOR_INTERVAL_SECS);
    config
}

fn apply_logging_defaults(mut config: DankConfig) -> DankConfig {
    config
        .log_level
        .get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    config
}
