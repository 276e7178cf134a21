//! Cooldown notice detection.
//!
//! A cooldown reply carries a future timestamp instead of an outcome, so it is
//! recognized before any family grammar runs.

use chrono::{DateTime, Utc};
use dankcord_core::{CommandResult, DankError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Discord timestamp tag: `<t:1700000000>` or `<t:1700000000:R>`.
static TIME_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<t:(-?[0-9]+)(?::[A-Za-z])?>").unwrap());

/// Whether the reply is a cooldown notice rather than a command outcome.
pub fn check_cooldown(text: &str) -> bool {
    text.contains("seconds") && text.contains("command") && text.contains("cooldown is")
}

/// Read the time tag out of a cooldown notice and return the remaining wait
/// relative to `now`.
pub fn parse_cooldown(text: &str, now: DateTime<Utc>) -> Result<CommandResult> {
    let ready_at: i64 = TIME_TAG_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| DankError::MalformedCooldown(excerpt(text)))?;

    let remaining_ms = ready_at
        .saturating_mul(1000)
        .saturating_sub(now.timestamp_millis());
    Ok(CommandResult::cooldown(remaining_ms as f64 / 1000.0))
}

fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    let mut out: String = text.chars().take(MAX_CHARS).collect();
    if text.chars().count() > MAX_CHARS {
        out.push('…');
    }
    out
}
