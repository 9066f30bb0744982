//! JSON extraction from model replies
//!
//! Models wrap JSON in prose or markdown fences more often than not. The
//! cascade tries, in order:
//! 1. Direct parse of the trimmed reply
//! 2. The first ```json (or bare ```) fenced block
//! 3. Balanced `{...}` or `[...]` regions, string-aware, from each opening
//!    bracket in turn until one parses

use serde_json::Value;
use tracing::debug;

/// Outcome of reading a reply into a typed shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse<T> {
    Parsed(T),
    Malformed { raw: String, reason: String },
}

impl<T> ParsedResponse<T> {
    pub fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParsedResponse<U> {
        match self {
            Self::Parsed(value) => ParsedResponse::Parsed(f(value)),
            Self::Malformed { raw, reason } => ParsedResponse::Malformed { raw, reason },
        }
    }

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// Which strategy of the cascade found the JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    DirectParse,
    MarkdownFence,
    BracketMatch,
}

/// Extract the first JSON value from a model reply.
///
/// # Errors
///
/// Returns a human-readable reason when no strategy yields valid JSON.
pub fn extract_json(raw: &str) -> Result<(Value, ExtractionMethod), String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("response is empty".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok((value, ExtractionMethod::DirectParse));
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str::<Value>(fenced.trim())
    {
        debug!("JSON extracted from markdown fence");
        return Ok((value, ExtractionMethod::MarkdownFence));
    }

    // Prose often carries brackets of its own (`[§0]`, `[1]`), so the search
    // moves on from regions that fail to parse or hold only scalars.
    let mut first_value = None;
    let mut first_error = None;
    for (start, _) in trimmed.match_indices(['{', '[']) {
        let Some(region) = bracket_region(&trimmed[start..]) else {
            continue;
        };
        match serde_json::from_str::<Value>(region) {
            Ok(value) if is_structured(&value) => {
                debug!(offset = start, "JSON extracted by bracket matching");
                return Ok((value, ExtractionMethod::BracketMatch));
            }
            Ok(value) => {
                first_value.get_or_insert(value);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(value) = first_value {
        return Ok((value, ExtractionMethod::BracketMatch));
    }
    if let Some(e) = first_error {
        return Err(format!("response contains invalid JSON: {e}"));
    }

    Err("response contains no JSON object or array".to_string())
}

/// Contents of the first fenced code block.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line
    let body_start = after_ticks.find('\n')? + 1;
    let body = &after_ticks[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// An object, or an array of objects (or an empty array).
fn is_structured(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().all(Value::is_object),
        _ => false,
    }
}

/// Balanced region opened by the bracket at the start of `text`, ignoring
/// brackets inside strings.
fn bracket_region(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First non-empty string among `keys` on a JSON object.
pub(crate) fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// First array among `keys` on a JSON object.
pub(crate) fn array_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_array)
}
