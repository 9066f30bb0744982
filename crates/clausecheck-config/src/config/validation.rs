use clausecheck_utils::error::ConfigError;

use super::{Config, SUPPORTED_PROVIDERS};

fn invalid(key: &str, value: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    }
}

fn check_range<T>(key: &str, value: Option<T>, min: T, max: T, unit: &str) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    match value {
        Some(v) if v < min => Err(invalid(key, format!("{v} is below the minimum of {min} {unit}"))),
        Some(v) if v > max => Err(invalid(key, format!("{v} exceeds the maximum of {max} {unit}"))),
        _ => Ok(()),
    }
}

fn check_temperature(key: &str, value: Option<f32>) -> Result<(), ConfigError> {
    match value {
        Some(t) if !(0.0..=2.0).contains(&t) => {
            Err(invalid(key, format!("{t} is outside 0.0..=2.0")))
        }
        _ => Ok(()),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        check_range("call_timeout", self.defaults.call_timeout, 5, 3600, "seconds")?;
        check_range("max_concurrency", self.defaults.max_concurrency, 1, 16, "calls")?;
        check_range(
            "chunk_budget_chars",
            self.defaults.chunk_budget_chars,
            1_000,
            1_000_000,
            "characters",
        )?;

        if let Some(format) = &self.defaults.output_format {
            match format.as_str() {
                "markdown" | "json" | "both" => {}
                _ => {
                    return Err(invalid(
                        "output_format",
                        format!("'{format}' is not valid. Must be 'markdown', 'json', or 'both'"),
                    ));
                }
            }
        }

        if let Some(model) = &self.defaults.model
            && model.trim().is_empty()
        {
            return Err(invalid("model", "must not be empty".to_string()));
        }

        match &self.llm.provider {
            Some(provider) if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) => {
                return Err(invalid(
                    "llm.provider",
                    format!("'{provider}' is not supported. Supported providers: openai, ollama"),
                ));
            }
            Some(_) => {}
            None => {
                return Err(ConfigError::MissingRequired(
                    "llm.provider is required (should default to 'ollama')".to_string(),
                ));
            }
        }

        if let Some(fallback) = &self.llm.fallback_provider
            && !SUPPORTED_PROVIDERS.contains(&fallback.as_str())
        {
            return Err(invalid(
                "llm.fallback_provider",
                format!("'{fallback}' is not supported. Supported providers: openai, ollama"),
            ));
        }

        if let Some(budget) = self.llm.call_budget
            && budget == 0
        {
            return Err(invalid("llm.call_budget", "must be greater than 0".to_string()));
        }

        if let Some(openai) = &self.llm.openai {
            check_temperature("llm.openai.temperature", openai.temperature)?;
            if let Some(max_tokens) = openai.max_tokens
                && max_tokens == 0
            {
                return Err(invalid(
                    "llm.openai.max_tokens",
                    "must be greater than 0".to_string(),
                ));
            }
            if let Some(url) = &openai.base_url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                return Err(invalid(
                    "llm.openai.base_url",
                    format!("'{url}' must start with http:// or https://"),
                ));
            }
        }

        if let Some(ollama) = &self.llm.ollama {
            check_temperature("llm.ollama.temperature", ollama.temperature)?;
            if let Some(url) = &ollama.base_url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                return Err(invalid(
                    "llm.ollama.base_url",
                    format!("'{url}' must start with http:// or https://"),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OllamaConfig, OpenAiConfig};

    fn base() -> Config {
        Config::minimal_for_testing("/tmp/cc")
    }

    fn invalid_key(config: &Config) -> String {
        match config.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => key,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let mut config = base();
        config.defaults.call_timeout = Some(5);
        config.defaults.max_concurrency = Some(16);
        config.defaults.chunk_budget_chars = Some(1_000_000);
        assert!(config.validate().is_ok());

        config.defaults.call_timeout = Some(3600);
        config.defaults.max_concurrency = Some(1);
        config.defaults.chunk_budget_chars = Some(1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_values_name_their_key() {
        let mut config = base();
        config.defaults.call_timeout = Some(4);
        assert_eq!(invalid_key(&config), "call_timeout");

        let mut config = base();
        config.defaults.max_concurrency = Some(0);
        assert_eq!(invalid_key(&config), "max_concurrency");

        let mut config = base();
        config.defaults.max_concurrency = Some(17);
        assert_eq!(invalid_key(&config), "max_concurrency");

        let mut config = base();
        config.defaults.chunk_budget_chars = Some(999);
        assert_eq!(invalid_key(&config), "chunk_budget_chars");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let mut config = base();
        config.llm.provider = Some("vertex".to_string());
        assert_eq!(invalid_key(&config), "llm.provider");

        let mut config = base();
        config.llm.fallback_provider = Some("gemini".to_string());
        assert_eq!(invalid_key(&config), "llm.fallback_provider");
    }

    #[test]
    fn test_missing_provider_rejected() {
        let mut config = base();
        config.llm.provider = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_provider_sections_validated() {
        let mut config = base();
        config.llm.openai = Some(OpenAiConfig {
            temperature: Some(3.5),
            ..OpenAiConfig::default()
        });
        assert_eq!(invalid_key(&config), "llm.openai.temperature");

        let mut config = base();
        config.llm.ollama = Some(OllamaConfig {
            base_url: Some("localhost:11434".to_string()),
            ..OllamaConfig::default()
        });
        assert_eq!(invalid_key(&config), "llm.ollama.base_url");
    }

    #[test]
    fn test_output_format_values() {
        let mut config = base();
        for format in ["markdown", "json", "both"] {
            config.defaults.output_format = Some(format.to_string());
            assert!(config.validate().is_ok());
        }
        config.defaults.output_format = Some("docx".to_string());
        assert_eq!(invalid_key(&config), "output_format");
    }
}
