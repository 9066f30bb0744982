use std::collections::BTreeMap;

use crate::ConfigSource;

use super::Config;

fn source_label(source: Option<&ConfigSource>) -> String {
    source.copied().unwrap_or(ConfigSource::Default).to_string()
}

impl Config {
    /// Get effective configuration as key-value pairs with source attribution
    ///
    /// Keys are sorted so `clausecheck config` output is stable. Derived values
    /// (the effective model, cache dir) are reported with the source of the
    /// setting that produced them.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add_config = |key: &str, value: Option<String>, source_key: &str| {
            if let Some(val) = value {
                let source = source_label(self.source_attribution.get(source_key));
                config.insert(key.to_string(), (val, source));
            }
        };

        let model_source = if self.defaults.model.is_some() {
            "model"
        } else {
            match self.provider() {
                "openai" => "llm.openai",
                _ => "llm.ollama",
            }
        };
        add_config("model", Some(self.effective_model()), model_source);
        add_config("llm.provider", Some(self.provider().to_string()), "llm.provider");
        add_config(
            "llm.fallback_provider",
            self.llm.fallback_provider.clone(),
            "llm.fallback_provider",
        );
        add_config(
            "llm.call_budget",
            self.llm.call_budget.map(|b| b.to_string()),
            "llm.call_budget",
        );
        add_config(
            "call_timeout",
            Some(self.call_timeout().as_secs().to_string()),
            "call_timeout",
        );
        add_config(
            "max_concurrency",
            Some(self.max_concurrency().to_string()),
            "max_concurrency",
        );
        add_config(
            "chunk_budget_chars",
            Some(self.chunk_budget_chars().to_string()),
            "chunk_budget_chars",
        );
        add_config(
            "output_dir",
            Some(self.output_dir().display().to_string()),
            "output_dir",
        );
        add_config(
            "output_format",
            Some(self.output_format().to_string()),
            "output_format",
        );
        add_config(
            "verbose",
            self.defaults.verbose.map(|v| v.to_string()),
            "verbose",
        );
        add_config(
            "cache.enabled",
            Some(self.cache_enabled().to_string()),
            "cache.enabled",
        );
        add_config(
            "cache.dir",
            Some(self.cache_dir().display().to_string()),
            "cache.dir",
        );

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_reports_sources() {
        let mut config = Config::minimal_for_testing("/tmp/cc");
        config
            .source_attribution
            .insert("max_concurrency".to_string(), ConfigSource::Cli);
        config.defaults.max_concurrency = Some(2);

        let effective = config.effective_config();
        assert_eq!(
            effective.get("max_concurrency"),
            Some(&("2".to_string(), "cli".to_string()))
        );
        assert_eq!(
            effective.get("model"),
            Some(&("qwen2.5:7b".to_string(), "default".to_string()))
        );
        assert!(!effective.contains_key("llm.fallback_provider"));
    }
}
