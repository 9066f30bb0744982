//! Credential redaction for messages that leave the process
//!
//! LLM provider errors can echo request URLs and headers back to us. Anything
//! that is logged, persisted to history, or printed for the user passes
//! through [`redact_credentials`] first.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern to match URLs with embedded credentials
static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s]+:[^@\s]+@").unwrap());

/// Pattern to match bearer tokens in echoed headers
static BEARER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+").unwrap());

/// Pattern to match potential API keys (long alphanumeric strings)
static POTENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_-])[A-Za-z0-9_-]{32,}(?:[^A-Za-z0-9_-]|$)").unwrap()
});

/// Redact sensitive information from a message
///
/// Redaction rules:
/// - URLs with embedded credentials keep scheme and host only
/// - `Bearer <token>` keeps the scheme word only
/// - Runs of 32+ key-like characters are replaced wholesale
#[must_use]
pub fn redact_credentials(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    let redacted = BEARER_TOKEN.replace_all(&redacted, "$1[REDACTED]");
    let redacted = POTENTIAL_KEY.replace_all(&redacted, "[REDACTED_KEY]");
    redacted.to_string()
}
