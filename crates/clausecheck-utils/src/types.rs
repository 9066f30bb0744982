use serde::{Deserialize, Serialize};
use std::fmt;

/// A configuration value together with where it came from.
///
/// # Example
///
/// ```rust
/// use clausecheck_utils::types::{ConfigValue, ConfigSource};
/// use serde_json::json;
///
/// let config_value = ConfigValue {
///     value: json!("qwen2.5:7b"),
///     source: ConfigSource::Config,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue {
    /// The configuration value as arbitrary JSON.
    pub value: serde_json::Value,
    /// Source of this configuration value.
    pub source: ConfigSource,
}

/// Source of a configuration value.
///
/// Precedence, highest first: CLI arguments > environment > config file >
/// programmatic overrides > built-in defaults.
///
/// Serializes to lowercase strings: `"cli"`, `"env"`, `"config"`,
/// `"programmatic"`, `"default"`.
///
/// ```rust
/// use clausecheck_utils::types::ConfigSource;
///
/// let json = serde_json::to_string(&ConfigSource::Env).unwrap();
/// assert_eq!(json, r#""env""#);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(any(test, feature = "test-utils"), derive(strum::VariantNames))]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value read from an environment variable.
    Env,
    /// Value loaded from configuration file.
    Config,
    /// Value provided programmatically (e.g., `Config::builder()`).
    Programmatic,
    /// Built-in default value (lowest precedence).
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        };
        f.write_str(label)
    }
}
