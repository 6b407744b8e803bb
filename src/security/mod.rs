//! Security utilities module
//!
//! Provides functionality for:
//! - Redacting secret fields from configuration before it is printed
//! - Secure logging without bot-token leakage

use serde_json::Value;

pub mod logging;

/// Field names whose values are never printed (compared case-insensitively)
const SENSITIVE_FIELD_NAMES: &[&str] = &["bottoken", "bot_token", "token", "secret", "password"];

/// Redaction placeholder
pub const REDACTED_PLACEHOLDER: &str = "***REDACTED***";

fn is_sensitive_field_name(name: &str) -> bool {
    let name_lower = name.to_lowercase();
    SENSITIVE_FIELD_NAMES.iter().any(|&s| name_lower == s)
}

/// Recursively redact sensitive fields from a JSON value
///
/// Empty strings are left alone so `config show` still reveals that a token
/// is missing.
///
/// # Example
/// ```
/// use serde_json::json;
/// use classbot::security::redact_secrets;
///
/// let config = json!({ "telegram": { "botToken": "123:abc", "pollTimeoutSecs": 35 } });
/// let redacted = redact_secrets(&config);
/// assert_eq!(redacted["telegram"]["botToken"], "***REDACTED***");
/// assert_eq!(redacted["telegram"]["pollTimeoutSecs"], 35);
/// ```
pub fn redact_secrets(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map.iter() {
                let hide = is_sensitive_field_name(key)
                    && val.as_str().map(|s| !s.is_empty()).unwrap_or(false);
                if hide {
                    redacted.insert(key.clone(), Value::String(REDACTED_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_secrets(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_secrets).collect()),
        other => other.clone(),
    }
}
