//! Command Event Logger
//!
//! Lifecycle of every issued command (issued, resolved, parsed, timed out),
//! emitted as structured entries on the `command_events` tracing target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandEvent {
    Issued {
        family: String,
        content: String,
    },
    Resolved {
        messages: usize,
        updates: usize,
    },
    Parsed {
        family: String,
        success: bool,
        on_cooldown: bool,
        summary: String,
    },
    TimedOut {
        waited_ms: u64,
    },
    Failed {
        error: String,
    },
}

impl CommandEvent {
    fn is_problem(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub nonce: String,
    pub timestamp: DateTime<Utc>,
    pub event: CommandEvent,
}

pub struct CommandEventLogger;

impl CommandEventLogger {
    /// Build the redacted entry for one lifecycle event.
    pub fn entry(nonce: &str, mut event: CommandEvent) -> EventLogEntry {
        match &mut event {
            CommandEvent::Issued { content, .. } => *content = redact_sensitive_data(content),
            CommandEvent::Parsed { summary, .. } => *summary = redact_sensitive_data(summary),
            CommandEvent::Failed { error } => *error = redact_sensitive_data(error),
            CommandEvent::Resolved { .. } | CommandEvent::TimedOut { .. } => {}
        }

        EventLogEntry {
            nonce: nonce.into(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Log one lifecycle event of the command identified by `nonce`.
    pub fn log_event(nonce: &str, event: CommandEvent) {
        let problem = event.is_problem();
        let entry = Self::entry(nonce, event);
        let json = serde_json::to_string(&entry).unwrap_or_default();
        if problem {
            warn!(target: "command_events", nonce = %entry.nonce, entry = %json, "Command event");
        } else {
            info!(target: "command_events", nonce = %entry.nonce, entry = %json, "Command event");
        }
    }
}
