use std::path::PathBuf;

/// Command-line overrides fed into configuration discovery.
///
/// Every field is optional; `None` leaves the lower-precedence value alone.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub model: Option<String>,
    pub llm_provider: Option<String>,
    pub call_timeout: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub chunk_budget_chars: Option<usize>,
    pub output_dir: Option<String>,
    pub output_format: Option<String>,
    pub verbose: Option<bool>,
    pub no_cache: bool,
}
