use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clausecheck_utils::error::ConfigError;

use super::{
    CacheConfig, Config, ConfigSource, DEFAULT_PROVIDER, Defaults, LlmConfig, OllamaConfig,
    OpenAiConfig,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding clausecheck without environment variables or
    /// config files.
    ///
    /// ```rust
    /// use clausecheck_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .provider("ollama")
    ///     .model("qwen2.5:14b")
    ///     .call_timeout(Duration::from_secs(90))
    ///     .max_concurrency(2)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.effective_model(), "qwen2.5:14b");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration of clausecheck.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic` in the resulting `Config`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    model: Option<String>,
    provider: Option<String>,
    fallback_provider: Option<String>,
    call_budget: Option<u32>,
    call_timeout: Option<Duration>,
    max_concurrency: Option<usize>,
    chunk_budget_chars: Option<usize>,
    output_dir: Option<String>,
    output_format: Option<String>,
    openai: Option<OpenAiConfig>,
    ollama: Option<OllamaConfig>,
    cache_dir: Option<PathBuf>,
    cache_enabled: Option<bool>,
}

impl ConfigBuilder {
    /// Create a new `ConfigBuilder` with no values set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the LLM provider (`openai` or `ollama`).
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: impl Into<String>) -> Self {
        self.fallback_provider = Some(provider.into());
        self
    }

    /// Cap the number of LLM calls per process.
    #[must_use]
    pub fn call_budget(mut self, calls: u32) -> Self {
        self.call_budget = Some(calls);
        self
    }

    /// Set the per-call timeout. Sub-second parts are truncated.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    #[must_use]
    pub fn chunk_budget_chars(mut self, chars: usize) -> Self {
        self.chunk_budget_chars = Some(chars);
        self
    }

    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = Some(format.into());
        self
    }

    #[must_use]
    pub fn openai(mut self, openai: OpenAiConfig) -> Self {
        self.openai = Some(openai);
        self
    }

    #[must_use]
    pub fn ollama(mut self, ollama: OllamaConfig) -> Self {
        self.ollama = Some(ollama);
        self
    }

    /// Enable the response cache rooted at `dir`.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self.cache_enabled = Some(true);
        self
    }

    /// Build the `Config`, validating every value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut source_attribution = HashMap::new();
        let mut mark = |key: &str, set: bool| {
            let source = if set {
                ConfigSource::Programmatic
            } else {
                ConfigSource::Default
            };
            source_attribution.insert(key.to_string(), source);
        };

        mark("model", self.model.is_some());
        mark("llm.provider", self.provider.is_some());
        mark("call_timeout", self.call_timeout.is_some());
        mark("max_concurrency", self.max_concurrency.is_some());
        mark("chunk_budget_chars", self.chunk_budget_chars.is_some());
        mark("output_dir", self.output_dir.is_some());
        mark("output_format", self.output_format.is_some());
        mark("cache.dir", self.cache_dir.is_some());
        mark("cache.enabled", self.cache_enabled.is_some());
        if self.fallback_provider.is_some() {
            mark("llm.fallback_provider", true);
        }
        if self.call_budget.is_some() {
            mark("llm.call_budget", true);
        }
        if self.openai.is_some() {
            mark("llm.openai", true);
        }
        if self.ollama.is_some() {
            mark("llm.ollama", true);
        }

        let base = Defaults::default();
        let defaults = Defaults {
            model: self.model,
            call_timeout: self
                .call_timeout
                .map(|t| t.as_secs())
                .or(base.call_timeout),
            max_concurrency: self.max_concurrency.or(base.max_concurrency),
            chunk_budget_chars: self.chunk_budget_chars.or(base.chunk_budget_chars),
            output_dir: self.output_dir.or(base.output_dir),
            output_format: self.output_format.or(base.output_format),
            verbose: base.verbose,
        };

        let config = Config {
            defaults,
            llm: LlmConfig {
                provider: Some(self.provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string())),
                fallback_provider: self.fallback_provider,
                call_budget: self.call_budget,
                openai: self.openai,
                ollama: self.ollama,
            },
            cache: CacheConfig {
                enabled: self.cache_enabled,
                dir: self.cache_dir.map(|d| d.display().to_string()),
            },
            source_attribution,
            config_path: None,
            home_dir: None,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.provider(), "ollama");
        assert_eq!(config.max_concurrency(), 3);
        assert_eq!(
            config.source_attribution.get("max_concurrency"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_builder_values_are_programmatic() {
        let config = Config::builder()
            .provider("openai")
            .chunk_budget_chars(4_000)
            .cache_dir("/tmp/cc-cache")
            .build()
            .unwrap();

        assert_eq!(config.chunk_budget_chars(), 4_000);
        assert_eq!(config.effective_model(), "gpt-4");
        assert!(config.cache_enabled());
        assert_eq!(
            config.source_attribution.get("llm.provider"),
            Some(&ConfigSource::Programmatic)
        );
    }

    #[test]
    fn test_builder_validates() {
        let err = Config::builder().max_concurrency(64).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_concurrency"));
    }
}
