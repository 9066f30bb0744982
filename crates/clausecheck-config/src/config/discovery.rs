use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use clausecheck_utils::error::ConfigError;

use super::{
    CacheConfig, CliArgs, Config, ConfigSource, DEFAULT_PROVIDER, Defaults, LlmConfig,
};

/// Environment variable pointing at the clausecheck home directory
pub const HOME_ENV: &str = "CLAUSECHECK_HOME";

/// Environment variable overriding `llm.provider`
pub const PROVIDER_ENV: &str = "CLAUSECHECK_LLM_PROVIDER";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    cache: Option<CacheConfig>,
}

/// Environment values that take part in discovery.
///
/// Captured once so discovery itself never reads process-global state; tests
/// build this directly.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub home: Option<PathBuf>,
    pub llm_provider: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|value| !value.is_empty());
        Self {
            home: non_empty(HOME_ENV).map(PathBuf::from),
            llm_provider: non_empty(PROVIDER_ENV),
        }
    }
}

/// Overwrite `target` with `value` when present and record where it came from.
fn merge<T>(
    target: &mut Option<T>,
    value: Option<T>,
    key: &str,
    source: ConfigSource,
    attribution: &mut HashMap<String, ConfigSource>,
) {
    if value.is_some() {
        *target = value;
        attribution.insert(key.to_string(), source);
    }
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory and the process environment.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_with(&start_dir, cli_args, &EnvOverrides::from_process())
    }

    /// Discover configuration starting from a specific directory
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        Self::discover_with(start_dir, cli_args, &EnvOverrides::from_process())
    }

    /// Discover configuration with explicit environment overrides
    pub fn discover_with(start_dir: &Path, cli_args: &CliArgs, env: &EnvOverrides) -> Result<Self> {
        let mut source_attribution = HashMap::new();

        let mut defaults = Defaults::default();
        let mut llm = LlmConfig::default();
        let mut cache = CacheConfig::default();

        for key in [
            "call_timeout",
            "max_concurrency",
            "chunk_budget_chars",
            "output_dir",
            "output_format",
            "verbose",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit_path) => {
                if !explicit_path.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit_path.display().to_string(),
                    }
                    .into());
                }
                Some(explicit_path.clone())
            }
            None => match Self::home_config_file(env.home.as_deref()) {
                Some(home_config) => Some(home_config),
                None => Self::discover_config_file_from(start_dir)?,
            },
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            let src = ConfigSource::Config;
            let attr = &mut source_attribution;

            if let Some(file_defaults) = file_config.defaults {
                merge(&mut defaults.model, file_defaults.model, "model", src, attr);
                merge(&mut defaults.call_timeout, file_defaults.call_timeout, "call_timeout", src, attr);
                merge(&mut defaults.max_concurrency, file_defaults.max_concurrency, "max_concurrency", src, attr);
                merge(&mut defaults.chunk_budget_chars, file_defaults.chunk_budget_chars, "chunk_budget_chars", src, attr);
                merge(&mut defaults.output_dir, file_defaults.output_dir, "output_dir", src, attr);
                merge(&mut defaults.output_format, file_defaults.output_format, "output_format", src, attr);
                merge(&mut defaults.verbose, file_defaults.verbose, "verbose", src, attr);
            }

            if let Some(file_llm) = file_config.llm {
                merge(&mut llm.provider, file_llm.provider, "llm.provider", src, attr);
                merge(&mut llm.fallback_provider, file_llm.fallback_provider, "llm.fallback_provider", src, attr);
                merge(&mut llm.call_budget, file_llm.call_budget, "llm.call_budget", src, attr);
                merge(&mut llm.openai, file_llm.openai, "llm.openai", src, attr);
                merge(&mut llm.ollama, file_llm.ollama, "llm.ollama", src, attr);
            }

            if let Some(file_cache) = file_config.cache {
                merge(&mut cache.enabled, file_cache.enabled, "cache.enabled", src, attr);
                merge(&mut cache.dir, file_cache.dir, "cache.dir", src, attr);
            }
        }

        // Environment overrides the file
        merge(
            &mut llm.provider,
            env.llm_provider.clone(),
            "llm.provider",
            ConfigSource::Env,
            &mut source_attribution,
        );

        // CLI overrides everything
        let cli = ConfigSource::Cli;
        let attr = &mut source_attribution;
        merge(&mut defaults.model, cli_args.model.clone(), "model", cli, attr);
        merge(&mut llm.provider, cli_args.llm_provider.clone(), "llm.provider", cli, attr);
        merge(&mut defaults.call_timeout, cli_args.call_timeout, "call_timeout", cli, attr);
        merge(&mut defaults.max_concurrency, cli_args.max_concurrency, "max_concurrency", cli, attr);
        merge(&mut defaults.chunk_budget_chars, cli_args.chunk_budget_chars, "chunk_budget_chars", cli, attr);
        merge(&mut defaults.output_dir, cli_args.output_dir.clone(), "output_dir", cli, attr);
        merge(&mut defaults.output_format, cli_args.output_format.clone(), "output_format", cli, attr);
        merge(&mut defaults.verbose, cli_args.verbose, "verbose", cli, attr);
        if cli_args.no_cache {
            merge(&mut cache.enabled, Some(false), "cache.enabled", cli, attr);
        }

        if llm.provider.is_none() {
            llm.provider = Some(DEFAULT_PROVIDER.to_string());
            source_attribution.insert("llm.provider".to_string(), ConfigSource::Default);
        }

        let config = Self {
            defaults,
            llm,
            cache,
            source_attribution,
            config_path,
            home_dir: env.home.clone(),
        };

        config.validate()?;

        Ok(config)
    }

    fn home_config_file(home: Option<&Path>) -> Option<PathBuf> {
        let candidate = home?.join("config.toml");
        candidate.is_file().then_some(candidate)
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up the directory tree looking for `.clausecheck/config.toml`,
    /// stopping at repository root markers (.git, .hg, .svn) or filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(".clausecheck").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent,
                None => break,
            }
        }

        Ok(None)
    }

    /// Load configuration from TOML file
    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: TomlConfig = toml::from_str(&content).with_context(|| {
                    format!("Failed to parse TOML config file: {}", path.display())
                })?;
                Ok(config)
            }
            // Removed between discovery and load
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }

    /// Discover configuration from environment and filesystem without CLI overrides.
    pub fn discover_from_env_and_fs() -> Result<Self> {
        Self::discover(&CliArgs::default())
    }
}
