//! Configuration management for clausecheck
//!
//! This module provides hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. Supports TOML configuration files with
//! `[defaults]`, `[llm]`, and `[cache]` sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{EnvOverrides, HOME_ENV, PROVIDER_ENV};
pub use model::*;
pub use clausecheck_utils::types::ConfigSource;

use std::path::PathBuf;
use std::time::Duration;

/// File name of the review history inside the cache directory
pub const HISTORY_FILE_NAME: &str = "review_history.json";

impl Config {
    /// The active provider name (`openai` or `ollama`).
    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// The model to request from the active provider.
    ///
    /// Precedence (highest to lowest):
    /// 1. `[defaults].model` (or `--model`)
    /// 2. The provider section's `model`
    /// 3. The provider's built-in default
    #[must_use]
    pub fn effective_model(&self) -> String {
        self.model_for_provider(self.provider())
    }

    /// The model that would be requested from `provider`.
    #[must_use]
    pub fn model_for_provider(&self, provider: &str) -> String {
        if let Some(model) = self.defaults.model.as_deref().filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        let (section_model, fallback) = match provider {
            "openai" => (
                self.llm.openai.as_ref().and_then(|c| c.model.clone()),
                DEFAULT_OPENAI_MODEL,
            ),
            _ => (
                self.llm.ollama.as_ref().and_then(|c| c.model.clone()),
                DEFAULT_OLLAMA_MODEL,
            ),
        };
        section_model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }

    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.defaults
            .max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    #[must_use]
    pub fn chunk_budget_chars(&self) -> usize {
        self.defaults
            .chunk_budget_chars
            .unwrap_or(DEFAULT_CHUNK_BUDGET_CHARS)
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.defaults.output_dir.as_deref().unwrap_or("reports"))
    }

    #[must_use]
    pub fn output_format(&self) -> &str {
        self.defaults.output_format.as_deref().unwrap_or("markdown")
    }

    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache.enabled.unwrap_or(false)
    }

    /// Directory for cached responses and the review history.
    ///
    /// `[cache].dir` wins, then `$CLAUSECHECK_HOME/cache`, then the platform
    /// cache directory, then `.clausecheck/cache` relative to the working dir.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = self.cache.dir.as_deref().filter(|d| !d.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(home) = &self.home_dir {
            return home.join("cache");
        }
        dirs::cache_dir()
            .map(|dir| dir.join("clausecheck"))
            .unwrap_or_else(|| PathBuf::from(".clausecheck").join("cache"))
    }

    /// Location of the review history file.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.cache_dir().join(HISTORY_FILE_NAME)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Config {
    /// Create a minimal Config for testing purposes
    ///
    /// Defaults only, no file, provider `ollama`, cache rooted at `cache_dir`.
    pub fn minimal_for_testing(cache_dir: impl Into<PathBuf>) -> Self {
        Config {
            defaults: Defaults::default(),
            llm: LlmConfig {
                provider: Some(DEFAULT_PROVIDER.to_string()),
                ..LlmConfig::default()
            },
            cache: CacheConfig {
                enabled: Some(false),
                dir: Some(cache_dir.into().display().to_string()),
            },
            source_attribution: std::collections::HashMap::new(),
            config_path: None,
            home_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(".clausecheck");
        fs::create_dir_all(&config_dir).unwrap();
        let config_path = config_dir.join("config.toml");
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn isolated_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        // Stop the upward search at the temp dir
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let defaults = Defaults::default();
        assert_eq!(defaults.call_timeout, Some(120));
        assert_eq!(defaults.max_concurrency, Some(3));
        assert_eq!(defaults.chunk_budget_chars, Some(12_000));
        assert_eq!(defaults.output_format, Some("markdown".to_string()));
        assert_eq!(defaults.verbose, Some(false));
        assert!(defaults.model.is_none());
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let dir = isolated_dir();
        let config =
            Config::discover_with(dir.path(), &CliArgs::default(), &EnvOverrides::default())
                .unwrap();

        assert!(config.config_path.is_none());
        assert_eq!(config.provider(), "ollama");
        assert_eq!(config.effective_model(), "qwen2.5:7b");
        assert_eq!(
            config.source_attribution.get("llm.provider"),
            Some(&ConfigSource::Default)
        );
        assert_eq!(config.max_concurrency(), 3);
    }

    #[test]
    fn test_file_then_env_then_cli_precedence() {
        let dir = isolated_dir();
        create_test_config_file(
            dir.path(),
            r#"
[defaults]
max_concurrency = 5
call_timeout = 60

[llm]
provider = "openai"

[llm.openai]
model = "deepseek-chat"
base_url = "https://api.deepseek.com/v1"
"#,
        );

        let config =
            Config::discover_with(dir.path(), &CliArgs::default(), &EnvOverrides::default())
                .unwrap();
        assert_eq!(config.provider(), "openai");
        assert_eq!(config.effective_model(), "deepseek-chat");
        assert_eq!(config.max_concurrency(), 5);
        assert_eq!(
            config.source_attribution.get("max_concurrency"),
            Some(&ConfigSource::Config)
        );

        let env = EnvOverrides {
            home: None,
            llm_provider: Some("ollama".to_string()),
        };
        let config = Config::discover_with(dir.path(), &CliArgs::default(), &env).unwrap();
        assert_eq!(config.provider(), "ollama");
        assert_eq!(
            config.source_attribution.get("llm.provider"),
            Some(&ConfigSource::Env)
        );

        let cli = CliArgs {
            llm_provider: Some("openai".to_string()),
            max_concurrency: Some(2),
            ..CliArgs::default()
        };
        let config = Config::discover_with(dir.path(), &cli, &env).unwrap();
        assert_eq!(config.provider(), "openai");
        assert_eq!(config.max_concurrency(), 2);
        assert_eq!(
            config.source_attribution.get("llm.provider"),
            Some(&ConfigSource::Cli)
        );
    }

    #[test]
    fn test_upward_search_finds_parent_config() {
        let dir = isolated_dir();
        create_test_config_file(dir.path(), "[defaults]\nchunk_budget_chars = 4000\n");
        let nested = dir.path().join("contracts").join("2024");
        fs::create_dir_all(&nested).unwrap();

        let found = Config::discover_config_file_from(&nested).unwrap();
        assert_eq!(found, Some(dir.path().join(".clausecheck").join("config.toml")));
    }

    #[test]
    fn test_home_config_is_preferred_over_upward_search() {
        let dir = isolated_dir();
        create_test_config_file(dir.path(), "[defaults]\nmax_concurrency = 4\n");
        let home = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[defaults]\nmax_concurrency = 7\n",
        )
        .unwrap();

        let env = EnvOverrides {
            home: Some(home.path().to_path_buf()),
            llm_provider: None,
        };
        let config = Config::discover_with(dir.path(), &CliArgs::default(), &env).unwrap();
        assert_eq!(config.max_concurrency(), 7);
        assert_eq!(config.cache_dir(), home.path().join("cache"));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = isolated_dir();
        let cli = CliArgs {
            config_path: Some(dir.path().join("nope.toml")),
            ..CliArgs::default()
        };
        let err =
            Config::discover_with(dir.path(), &cli, &EnvOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let dir = isolated_dir();
        create_test_config_file(dir.path(), "[selectors]\ninclude = []\n");
        let result =
            Config::discover_with(dir.path(), &CliArgs::default(), &EnvOverrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_no_cache_flag_disables_cache() {
        let dir = isolated_dir();
        create_test_config_file(dir.path(), "[cache]\nenabled = true\n");
        let cli = CliArgs {
            no_cache: true,
            ..CliArgs::default()
        };
        let config = Config::discover_with(dir.path(), &cli, &EnvOverrides::default()).unwrap();
        assert!(!config.cache_enabled());
    }

    #[test]
    fn test_history_path_lives_in_cache_dir() {
        let config = Config::minimal_for_testing("/tmp/cc-cache");
        assert_eq!(
            config.history_path(),
            PathBuf::from("/tmp/cc-cache").join(HISTORY_FILE_NAME)
        );
    }
}
