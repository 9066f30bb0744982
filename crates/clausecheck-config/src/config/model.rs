use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use clausecheck_utils::types::ConfigSource;

/// Default per-call timeout for gateway calls, in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 120;

/// Default number of analyzer chunks in flight at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default size budget of one analyzer chunk, in characters of rendered sections
pub const DEFAULT_CHUNK_BUDGET_CHARS: usize = 12_000;

/// Default provider when nothing is configured
pub const DEFAULT_PROVIDER: &str = "ollama";

/// Default Ollama endpoint and model
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";

/// Default OpenAI-compatible endpoint, key variable and model
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Providers the LLM factory knows how to build
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "ollama"];

/// Configuration for clausecheck.
///
/// `Config` provides hierarchical configuration with discovery and precedence:
/// CLI arguments > environment > config file > built-in defaults.
///
/// # Discovery
///
/// Use [`Config::discover()`] for CLI-like behavior that:
/// - Uses `--config <path>` when given
/// - Otherwise reads `$CLAUSECHECK_HOME/config.toml` when that file exists
/// - Otherwise searches for `.clausecheck/config.toml` upward from the current directory
/// - Applies built-in defaults for unspecified values
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// model = "qwen2.5:7b"
/// call_timeout = 120
/// max_concurrency = 3
/// chunk_budget_chars = 12000
/// output_dir = "reports"
/// output_format = "markdown"
///
/// [llm]
/// provider = "openai"
/// fallback_provider = "ollama"
/// call_budget = 40
///
/// [llm.openai]
/// base_url = "https://api.deepseek.com/v1"
/// api_key_env = "DEEPSEEK_API_KEY"
/// model = "deepseek-chat"
///
/// [cache]
/// enabled = true
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Default values for review runs.
    pub defaults: Defaults,
    /// LLM provider configuration.
    pub llm: LlmConfig,
    /// Response cache configuration.
    pub cache: CacheConfig,
    /// Source attribution for each setting (for `clausecheck config`).
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// `CLAUSECHECK_HOME`, when set.
    pub home_dir: Option<PathBuf>,
}

/// Default configuration values
///
/// `model` is left unset by default; the active provider's own default model
/// applies (see [`Config::effective_model`]).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Defaults {
    pub model: Option<String>,
    /// Per-call timeout in seconds
    pub call_timeout: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub chunk_budget_chars: Option<usize>,
    pub output_dir: Option<String>,
    /// `markdown`, `json` or `both`
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: None,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT_SECS),
            max_concurrency: Some(DEFAULT_MAX_CONCURRENCY),
            chunk_budget_chars: Some(DEFAULT_CHUNK_BUDGET_CHARS),
            output_dir: Some("reports".to_string()),
            output_format: Some("markdown".to_string()),
            verbose: Some(false),
        }
    }
}

/// LLM provider configuration (`[llm]`)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LlmConfig {
    /// `openai` or `ollama`
    pub provider: Option<String>,
    /// Provider used when the primary one cannot be constructed
    pub fallback_provider: Option<String>,
    /// Maximum number of LLM calls per process
    pub call_budget: Option<u32>,
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
}

/// OpenAI-compatible provider configuration (`[llm.openai]`)
///
/// Works for OpenAI, DeepSeek and any server exposing `/chat/completions`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OpenAiConfig {
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    /// Overrides the per-stage temperatures when set
    pub temperature: Option<f32>,
}

/// Local Ollama configuration (`[llm.ollama]`)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct OllamaConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Overrides the per-stage temperatures when set
    pub temperature: Option<f32>,
}

/// Response cache configuration (`[cache]`)
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
    /// Cache directory; defaults to the platform cache dir
    pub dir: Option<String>,
}
