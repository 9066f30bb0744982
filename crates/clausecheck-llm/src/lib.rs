//! LLM backend abstraction for multi-provider support
//!
//! All providers implement the `LlmBackend` trait, so the review engine works
//! with any of them without knowing HTTP details. The factory in this module
//! picks the provider from configuration, falls back to a secondary provider
//! when the primary cannot be constructed, and layers the call budget and the
//! response cache on top.

mod budgeted_backend;
mod cached_backend;
pub(crate) mod http_client;
mod ollama_backend;
mod openai_backend;
mod types;

pub use budgeted_backend::BudgetedBackend;
pub use cached_backend::{CACHE_HIT_EXTENSION, CACHE_KEY_EXTENSION, CachedBackend};
pub use clausecheck_utils::error::LlmError;
pub use types::{LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role};

pub(crate) use ollama_backend::OllamaBackend;
pub(crate) use openai_backend::OpenAiBackend;

use camino::Utf8PathBuf;
use clausecheck_config::{Config, SUPPORTED_PROVIDERS};
use clausecheck_utils::redaction::redact_credentials;
use tracing::{info, warn};

/// Subdirectory of the cache directory holding response entries
pub const RESPONSE_CACHE_DIR: &str = "responses";

/// Construct the bare backend for one provider, without budget or cache.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` if the provider is unknown.
/// Returns `LlmError::Misconfiguration` if provider-specific configuration is invalid.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    match provider {
        "openai" => Ok(Box::new(OpenAiBackend::new_from_config(config)?)),
        "ollama" => Ok(Box::new(OllamaBackend::new_from_config(config)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{}'. Supported providers: {}.",
            unknown,
            SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

/// Wrap a bare backend with the configured call budget and response cache.
///
/// The cache is the outer layer: hits are answered before the budget is
/// consulted, so only real provider calls count against it.
fn wrap_backend(
    backend: Box<dyn LlmBackend>,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    let mut backend = backend;

    if let Some(limit) = config.llm.call_budget {
        backend = Box::new(BudgetedBackend::new(backend, limit));
    }

    if config.cache_enabled() {
        let dir = config.cache_dir().join(RESPONSE_CACHE_DIR);
        let dir = Utf8PathBuf::from_path_buf(dir).map_err(|path| {
            LlmError::Misconfiguration(format!(
                "Cache directory is not valid UTF-8: {}",
                path.display()
            ))
        })?;
        backend = Box::new(CachedBackend::new(backend, dir));
    }

    Ok(backend)
}

/// Create an LLM backend from configuration, returning fallback metadata when used.
///
/// If the primary provider fails to construct and `llm.fallback_provider` is
/// set, the fallback backend is returned together with an `LlmFallbackInfo`
/// describing why. Runtime failures (timeouts, outages) never trigger the
/// fallback; only construction failures do.
///
/// # Errors
///
/// Returns the primary provider's error when it cannot be constructed and no
/// usable fallback exists.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Box<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.provider();

    match construct_backend_for_provider(provider, config) {
        Ok(backend) => Ok((wrap_backend(backend, config)?, None)),
        Err(primary_error) => {
            let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
                return Err(primary_error);
            };

            let reason = redact_credentials(&primary_error.to_string());
            warn!(
                primary = provider,
                fallback = fallback_provider,
                reason = %reason,
                "Primary provider failed during construction, attempting fallback"
            );

            match construct_backend_for_provider(fallback_provider, config) {
                Ok(fallback_backend) => {
                    info!(provider = fallback_provider, "Using fallback provider");
                    Ok((
                        wrap_backend(fallback_backend, config)?,
                        Some(LlmFallbackInfo {
                            primary_provider: provider.to_string(),
                            fallback_provider: fallback_provider.to_string(),
                            reason,
                        }),
                    ))
                }
                Err(fallback_error) => {
                    warn!(
                        provider = fallback_provider,
                        error = %redact_credentials(&fallback_error.to_string()),
                        "Fallback provider also failed"
                    );
                    // The primary error is the one the user has to fix
                    Err(primary_error)
                }
            }
        }
    }
}

/// Create an LLM backend from configuration, discarding fallback metadata.
///
/// # Errors
///
/// See [`from_config_with_fallback`].
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    let (backend, _fallback_info) = from_config_with_fallback(config)?;
    Ok(backend)
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use clausecheck_config::OpenAiConfig;
    use tempfile::TempDir;

    // Never set by any test; construction of the openai backend always fails
    const UNSET_KEY_ENV: &str = "CLAUSECHECK_TEST_KEY_THAT_IS_NEVER_SET";

    fn openai_without_key(cache_dir: &std::path::Path) -> Config {
        let mut config = Config::minimal_for_testing(cache_dir);
        config.llm.provider = Some("openai".to_string());
        config.llm.openai = Some(OpenAiConfig {
            api_key_env: Some(UNSET_KEY_ENV.to_string()),
            ..OpenAiConfig::default()
        });
        config
    }

    #[test]
    fn test_default_provider_is_ollama() {
        let dir = TempDir::new().unwrap();
        let config = Config::minimal_for_testing(dir.path());
        let backend = from_config(&config).unwrap();
        assert_eq!(backend.provider_name(), "ollama");
    }

    #[test]
    fn test_unknown_provider_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::minimal_for_testing(dir.path());
        config.llm.provider = Some("gemini".to_string());

        match from_config(&config) {
            Err(LlmError::Unsupported(msg)) => {
                assert!(msg.contains("gemini"));
                assert!(msg.contains("openai, ollama"));
            }
            Err(other) => panic!("Expected Unsupported, got {other:?}"),
            Ok(_) => panic!("Expected Unsupported, got a backend"),
        }
    }

    #[test]
    fn test_missing_api_key_without_fallback_is_misconfiguration() {
        let dir = TempDir::new().unwrap();
        let config = openai_without_key(dir.path());

        match from_config_with_fallback(&config) {
            Err(LlmError::Misconfiguration(msg)) => assert!(msg.contains(UNSET_KEY_ENV)),
            Err(other) => panic!("Expected Misconfiguration, got {other:?}"),
            Ok(_) => panic!("Expected Misconfiguration, got a backend"),
        }
    }

    #[test]
    fn test_fallback_info_returned_when_fallback_used() {
        let dir = TempDir::new().unwrap();
        let mut config = openai_without_key(dir.path());
        config.llm.fallback_provider = Some("ollama".to_string());

        let (backend, info) = from_config_with_fallback(&config).unwrap();
        assert_eq!(backend.provider_name(), "ollama");

        let info = info.expect("fallback info");
        assert_eq!(info.primary_provider, "openai");
        assert_eq!(info.fallback_provider, "ollama");
        assert!(info.reason.contains(UNSET_KEY_ENV));
    }

    #[test]
    fn test_failing_fallback_returns_primary_error() {
        let dir = TempDir::new().unwrap();
        let mut config = openai_without_key(dir.path());
        config.llm.fallback_provider = Some("nonexistent".to_string());

        assert!(matches!(
            from_config_with_fallback(&config),
            Err(LlmError::Misconfiguration(_))
        ));
    }

    #[test]
    fn test_budget_and_cache_keep_provider_name() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::minimal_for_testing(dir.path());
        config.llm.call_budget = Some(10);
        config.cache.enabled = Some(true);

        let backend = from_config(&config).unwrap();
        assert_eq!(backend.provider_name(), "ollama");
    }
}
