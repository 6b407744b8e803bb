//! Secure logging utilities
//!
//! The Bot API puts the token in the request path, so HTTP client errors
//! carry it in their URL. Everything bound for the logs from the transport
//! goes through [`sanitize_error_message`].

use regex::Regex;
use std::sync::LazyLock;

static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // Token embedded in a Bot API URL: https://api.telegram.org/bot<token>/method
        (
            Regex::new(r"(/bot)\d{5,}:[A-Za-z0-9_-]+").unwrap(),
            "${1}***BOT_TOKEN_REDACTED***",
        ),
        // Bare bot tokens
        (
            Regex::new(r"\b\d{5,}:[A-Za-z0-9_-]{30,}").unwrap(),
            "***BOT_TOKEN_REDACTED***",
        ),
        // Tokens passed as query parameters
        (
            Regex::new(r"(?i)([?&](token|secret)=)[^&\s]+").unwrap(),
            "${1}***REDACTED***",
        ),
    ]
});

/// Sanitize a log message to remove bot tokens
pub fn sanitize_log_message(message: &str) -> String {
    let mut result = message.to_string();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Sanitize an error before it is logged or wrapped in a `ChannelError`
pub fn sanitize_error_message<E: std::fmt::Display + ?Sized>(error: &E) -> String {
    sanitize_log_message(&error.to_string())
}
