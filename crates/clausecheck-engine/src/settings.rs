use clausecheck_config::{
    Config, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_CHUNK_BUDGET_CHARS, DEFAULT_MAX_CONCURRENCY,
};
use std::time::Duration;

/// Sampling temperature of the planning call.
pub const PLANNING_TEMPERATURE: f32 = 0.3;

/// Sampling temperature of the review calls.
pub const REVIEW_TEMPERATURE: f32 = 0.5;

/// Immutable engine settings, fixed when the orchestrator is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSettings {
    /// Model requested on every call; empty means the backend default
    pub model: String,
    /// Upper bound on concurrently running chunk calls
    pub max_concurrency: usize,
    /// Timeout applied to each gateway call
    pub call_timeout: Duration,
    /// Rendered characters per analysis chunk
    pub chunk_budget_chars: usize,
    pub planning_temperature: f32,
    pub review_temperature: f32,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            chunk_budget_chars: DEFAULT_CHUNK_BUDGET_CHARS,
            planning_temperature: PLANNING_TEMPERATURE,
            review_temperature: REVIEW_TEMPERATURE,
        }
    }
}

impl ReviewSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.effective_model(),
            max_concurrency: config.max_concurrency().max(1),
            call_timeout: config.call_timeout(),
            chunk_budget_chars: config.chunk_budget_chars(),
            ..Self::default()
        }
    }
}
