use anyhow::{Context, Result};
use blake3::Hasher;
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// This is the standard way to emit JSON reports and cache entries. JCS ensures
/// deterministic output regardless of field ordering in the source struct.
///
/// ```rust
/// use clausecheck_utils::canonicalization::emit_jcs;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Output {
///     zeta: u8,
///     alpha: &'static str,
/// }
///
/// let json = emit_jcs(&Output { zeta: 1, alpha: "a" }).unwrap();
/// assert_eq!(json, r#"{"alpha":"a","zeta":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// BLAKE3 hex digest of raw text.
#[must_use]
pub fn content_digest(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// BLAKE3 hex digest over several parts.
///
/// Each part is length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
#[must_use]
pub fn digest_parts<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_jcs_sorts_keys() {
        let value = json!({"b": 1, "a": {"d": [3, 2], "c": "条款"}});
        let emitted = emit_jcs(&value).unwrap();
        assert_eq!(emitted, r#"{"a":{"c":"条款","d":[3,2]},"b":1}"#);
    }

    #[test]
    fn test_content_digest_is_stable() {
        let a = content_digest("第一条 付款方式");
        let b = content_digest("第一条 付款方式");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_digest("第二条 违约责任"));
    }

    #[test]
    fn test_digest_parts_is_boundary_sensitive() {
        assert_ne!(digest_parts(["ab", "c"]), digest_parts(["a", "bc"]));
        assert_eq!(digest_parts(["x", "y"]), digest_parts(["x", "y"]));
    }
}
