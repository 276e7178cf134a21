//! Log Redaction Layer
//!
//! Scrubs Discord account tokens and bearer credentials from strings prior to logging.

use once_cell::sync::Lazy;
use regex::Regex;

/// User and bot tokens: base64 id, timestamp, HMAC joined by dots.
static DISCORD_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:mfa\.[A-Za-z0-9_\-]{20,})|(?:[A-Za-z0-9_\-]{23,28}\.[A-Za-z0-9_\-]{6,7}\.[A-Za-z0-9_\-]{27,})").unwrap()
});
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:Bearer|Bot) [A-Za-z0-9\-\._~+/]{20,}=*").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "[REDACTED_TOKEN]");
    DISCORD_TOKEN_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}
