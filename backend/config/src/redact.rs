//! Config redaction: safe-to-print config snapshots.

use serde_json::Value;

/// Keys whose values are credentials.
static SECRET_KEYS: &[&str] = &["token", "bot_token", "password", "secret", "authorization"];

/// Replace every credential in a config value with a short hint ending in `***`.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn redact_string(s: &str, key: &str) -> Value {
    if !is_secret_key(key) || s.is_empty() {
        return Value::String(s.to_string());
    }
    let hint: String = if s.chars().count() > 8 {
        s.chars().take(4).collect()
    } else {
        String::new()
    };
    Value::String(format!("{hint}***"))
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) => redact_string(s, key),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}
