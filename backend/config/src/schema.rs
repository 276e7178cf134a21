//! DankCord runtime configuration schema.
//!
//! Typed for serde YAML/JSON deserialization. Fields with a default are
//! optional in the file; `defaults::apply_all_defaults` fills them in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults::{
    DEFAULT_COMMAND_PREFIX, DEFAULT_JANITOR_INTERVAL_SECS, DEFAULT_LOG_LEVEL,
    DEFAULT_REPLY_TIMEOUT_SECS, DEFAULT_STALE_AFTER_SECS,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DankConfig {
    /// User token used to talk to Discord.
    #[serde(default)]
    pub token: String,

    /// Channel (or DM channel) commands are issued in.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub channel_id: u64,

    /// Issue commands in a DM channel instead of a guild channel.
    #[serde(default)]
    pub dm_mode: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_intensivity: Option<ResourceIntensivity>,

    /// Our own user id, used to recognize echoes of our commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_timeout_secs: Option<u64>,

    /// Pending entries older than this are expired by the janitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_after_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub janitor_interval_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Directory for the rolling JSON log file. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl DankConfig {
    pub fn resource_intensivity(&self) -> ResourceIntensivity {
        self.resource_intensivity.unwrap_or_default()
    }

    pub fn command_prefix(&self) -> &str {
        self.command_prefix.as_deref().unwrap_or(DEFAULT_COMMAND_PREFIX)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs.unwrap_or(DEFAULT_REPLY_TIMEOUT_SECS))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs.unwrap_or(DEFAULT_STALE_AFTER_SECS))
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(
            self.janitor_interval_secs
                .unwrap_or(DEFAULT_JANITOR_INTERVAL_SECS),
        )
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Directory for the rolling JSON log file, when file logging is on.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

impl fmt::Debug for DankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DankConfig")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("dm_mode", &self.dm_mode)
            .field("resource_intensivity", &self.resource_intensivity())
            .field("self_user_id", &self.self_user_id)
            .field("command_prefix", &self.command_prefix())
            .field("reply_timeout_secs", &self.reply_timeout().as_secs())
            .field("stale_after_secs", &self.stale_after().as_secs())
            .field("janitor_interval_secs", &self.janitor_interval().as_secs())
            .field("log_level", &self.log_level())
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Resource intensivity
// ---------------------------------------------------------------------------

/// Where bulky state is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceIntensivity {
    #[default]
    Mem,
    Disk,
}

impl FromStr for ResourceIntensivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MEM" => Ok(Self::Mem),
            "DISK" => Ok(Self::Disk),
            other => Err(format!(
                "resource intensivity must be either DISK or MEM, got '{other}'"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ResourceIntensivity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Discord ids are often quoted in config files.
fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u64),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) if s.trim().is_empty() => Ok(0),
        NumOrString::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("'{s}' is not a numeric id"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_minimal_yaml() {
        let cfg: DankConfig =
            serde_yaml::from_str("token: abc\nchannel_id: 123456789012345678\n").unwrap();
        assert_eq!(cfg.token, "abc");
        assert_eq!(cfg.channel_id, 123456789012345678);
        assert!(!cfg.dm_mode);
        assert_eq!(cfg.resource_intensivity(), ResourceIntensivity::Mem);
        assert_eq!(cfg.command_prefix(), "pls");
        assert_eq!(cfg.reply_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_channel_id_may_be_quoted() {
        let cfg: DankConfig = serde_yaml::from_str("channel_id: \"42\"").unwrap();
        assert_eq!(cfg.channel_id, 42);
        assert!(serde_yaml::from_str::<DankConfig>("channel_id: general").is_err());
    }

    #[test]
    fn test_resource_intensivity_is_case_insensitive() {
        let cfg: DankConfig = serde_yaml::from_str("resource_intensivity: disk").unwrap();
        assert_eq!(cfg.resource_intensivity(), ResourceIntensivity::Disk);
        assert!(serde_yaml::from_str::<DankConfig>("resource_intensivity: ssd").is_err());
    }

    #[test]
    fn test_logging_settings() {
        let cfg: DankConfig = serde_yaml::from_str("log_dir: /var/log/dankcord").unwrap();
        assert_eq!(cfg.log_dir(), Some(Path::new("/var/log/dankcord")));
        assert_eq!(cfg.log_level(), DEFAULT_LOG_LEVEL);
        assert_eq!(DankConfig::default().log_dir(), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let cfg = DankConfig {
            token: "super-secret-token".into(),
            channel_id: 1,
            ..Default::default()
        };
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("super-secret-token"));
        assert!(printed.contains("<redacted>"));
    }
}
