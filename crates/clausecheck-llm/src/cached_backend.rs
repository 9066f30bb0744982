//! Response cache for LLM invocations
//!
//! Identical invocations (same provider, model, temperature and messages) are
//! answered from disk. Entries are canonical JSON files named by the blake3
//! digest of the invocation, written atomically so a crashed run never leaves
//! a torn entry behind.
//!
//! Every result carries its entry key, so a caller that rejects a reply
//! (for example one that fails a schema check) can evict it through
//! [`LlmBackend::reject`] instead of replaying it in later runs.

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use clausecheck_utils::atomic_write::write_file_atomic;
use clausecheck_utils::canonicalization::{digest_parts, emit_jcs};
use tracing::{debug, warn};

/// Extension key set on results served from the cache
pub const CACHE_HIT_EXTENSION: &str = "cache_hit";

/// Extension key holding the cache entry a result belongs to
pub const CACHE_KEY_EXTENSION: &str = "cache_key";

pub struct CachedBackend {
    inner: Box<dyn LlmBackend>,
    dir: Utf8PathBuf,
}

impl CachedBackend {
    #[must_use]
    pub fn new(inner: Box<dyn LlmBackend>, dir: Utf8PathBuf) -> Self {
        debug!(dir = %dir, "Creating CachedBackend");
        Self { inner, dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Cache key of an invocation
    ///
    /// Run id and stage are excluded: the same prompt in a later run must hit.
    #[must_use]
    pub fn cache_key(&self, inv: &LlmInvocation) -> String {
        let temperature = inv
            .temperature
            .map(|t| format!("{t:.3}"))
            .unwrap_or_default();

        let mut parts: Vec<&str> = vec![self.inner.provider_name(), &inv.model, &temperature];
        for message in &inv.messages {
            parts.push(message.role.as_str());
            parts.push(&message.content);
        }
        digest_parts(parts)
    }

    fn entry_path(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_entry(&self, path: &Utf8Path) -> Option<LlmResult> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<LlmResult>(&content) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(path = %path, error = %e, "Ignoring unreadable cache entry");
                None
            }
        }
    }

    fn write_entry(&self, path: &Utf8Path, result: &LlmResult) {
        let outcome = emit_jcs(result).and_then(|json| write_file_atomic(path, &json));
        if let Err(e) = outcome {
            // A cache write failure never fails the call
            warn!(path = %path, error = %e, "Failed to write cache entry");
        }
    }
}

#[async_trait]
impl LlmBackend for CachedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let key = self.cache_key(&inv);
        let path = self.entry_path(&key);

        if let Some(cached) = self.read_entry(&path) {
            debug!(key = %key, stage = %inv.stage, "Cache hit");
            return Ok(cached
                .with_extension(CACHE_HIT_EXTENSION, serde_json::json!(true))
                .with_extension(CACHE_KEY_EXTENSION, serde_json::json!(key)));
        }

        debug!(key = %key, stage = %inv.stage, "Cache miss");
        let result = self.inner.invoke(inv).await?;
        self.write_entry(&path, &result);
        Ok(result.with_extension(CACHE_KEY_EXTENSION, serde_json::json!(key)))
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn reject(&self, result: &LlmResult) {
        let Some(key) = result
            .extensions
            .get(CACHE_KEY_EXTENSION)
            .and_then(serde_json::Value::as_str)
        else {
            return;
        };
        // Keys are hex digests; anything else did not come from this cache
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return;
        }

        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(key = %key, "Evicted rejected cache entry"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path, error = %e, "Failed to evict cache entry"),
        }
        self.inner.reject(result);
    }
}
