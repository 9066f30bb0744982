use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::exit_codes::ExitCode;
use crate::redaction::redact_credentials;

/// Library-level error type for a contract review run.
///
/// `ReviewError` is what the engine returns from every stage. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes for consistent error reporting
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration errors |
/// | 3 | Document could not be parsed |
/// | 4 | Model response failed the schema check after the retry |
/// | 10 | A gateway call timed out |
/// | 70 | Any other upstream (LLM provider) failure |
/// | 130 | Run was cancelled |
/// | 1 | Report assembly defects and other internal errors |
///
/// Library code returns `ReviewError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Document parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Model response schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Report assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Review run was cancelled")]
    Cancelled,

    /// A broken invariant inside the engine (invalid stage transition, lost task)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    DocumentInput,
    ModelResponse,
    ProviderIntegration,
    ResourceLimits,
    Cancellation,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::DocumentInput => write!(f, "Document Input"),
            Self::ModelResponse => write!(f, "Model Response"),
            Self::ProviderIntegration => write!(f, "Provider Integration"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Cancellation => write!(f, "Cancellation"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Errors raised while splitting a document into sections.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Document is empty or contains only whitespace")]
    EmptyDocument,

    #[error("Structure hint points at line {line}, but the document has {line_count} lines")]
    HintOutOfRange { line: usize, line_count: usize },
}

impl UserFriendlyError for ParseError {
    fn user_message(&self) -> String {
        match self {
            Self::EmptyDocument => "The contract document has no text to review".to_string(),
            Self::HintOutOfRange { line, line_count } => format!(
                "Heading hint for line {line} is outside the document ({line_count} lines)"
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::EmptyDocument => Some(
                "Only plain UTF-8 text is read. Word and PDF files must be converted first."
                    .to_string(),
            ),
            Self::HintOutOfRange { .. } => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::EmptyDocument => vec![
                "Check that the file path points at the contract text".to_string(),
                "Export the contract to .txt and try again".to_string(),
            ],
            Self::HintOutOfRange { .. } => {
                vec!["Heading hints use 0-based line numbers".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::DocumentInput
    }
}

/// The model's reply could not be read into the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A single response failed the schema check.
    #[error("{context}: {reason}")]
    Invalid { context: String, reason: String },

    /// The bounded retry was spent and the last response still failed.
    #[error("{context}: response still invalid after {attempts} attempts: {reason}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        reason: String,
    },
}

impl SchemaError {
    /// The underlying reason without the context prefix.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Invalid { reason, .. } | Self::RetriesExhausted { reason, .. } => reason,
        }
    }
}

impl UserFriendlyError for SchemaError {
    fn user_message(&self) -> String {
        match self {
            Self::Invalid { context, reason } => {
                format!("The model returned an unusable answer for {context}: {reason}")
            }
            Self::RetriesExhausted {
                context, attempts, ..
            } => format!(
                "The model returned an unusable answer for {context} {attempts} times in a row"
            ),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Every prompt declares its JSON response shape. Replies that do not match it are retried once with a correction."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Run again; model output varies between calls".to_string(),
            "Use a larger or instruction-tuned model (--model)".to_string(),
            "Lower --chunk-budget so each review call carries less text".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::ModelResponse
    }
}

/// Defects found while building the final report. These indicate a bug.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Finding {finding} references section {section_ref}, but only {section_count} sections exist")]
    UnknownSection {
        finding: usize,
        section_ref: usize,
        section_count: usize,
    },

    #[error("Failed to serialize report: {0}")]
    Serialization(String),
}

impl UserFriendlyError for AssemblyError {
    fn user_message(&self) -> String {
        format!("Internal error while assembling the report: {self}")
    }

    fn context(&self) -> Option<String> {
        Some("Findings are validated before assembly, so this indicates a bug.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        vec!["Re-run with --verbose and report the log output".to_string()]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Internal
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::MissingRequired(key) => {
                format!("Required configuration '{key}' is missing")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => {
                format!("Configuration file not found: {path}")
            }
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [defaults], [llm] and [cache] sections."
                    .to_string(),
            ),
            Self::NotFound { .. } | Self::DiscoveryFailed { .. } => Some(
                "clausecheck searches for .clausecheck/config.toml starting from the current directory upward."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' configuration option has specific range requirements."
            )),
            Self::MissingRequired(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax using a TOML validator".to_string(),
                "Run 'clausecheck config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!(
                "Add '{key}' to .clausecheck/config.toml or pass it as a CLI flag"
            )],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "call_timeout" => vec!["Use a value between 5 and 3600 seconds".to_string()],
                "max_concurrency" => vec!["Use a value between 1 and 16".to_string()],
                "chunk_budget_chars" => {
                    vec!["Use a value between 1000 and 1000000 characters".to_string()]
                }
                "llm.provider" | "llm.fallback_provider" => {
                    vec!["Supported providers are 'openai' and 'ollama'".to_string()]
                }
                _ => vec!["Remove the option to use the default value".to_string()],
            },
            Self::NotFound { .. } => vec![
                "Create .clausecheck/config.toml in your project root".to_string(),
                "Use CLI flags instead of a configuration file".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the directory tree".to_string(),
                "Use --config <path> to specify configuration file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed envelope)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM call timed out after {}s", duration.as_secs())
            }
            Self::BudgetExceeded { limit, attempted } => format!(
                "LLM call budget exhausted: attempted {attempted} calls with a limit of {limit}"
            ),
            Self::Misconfiguration(msg) => format!("LLM provider misconfigured: {msg}"),
            Self::Unsupported(msg) => format!("Unsupported LLM feature: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => {
                Some("The provider could not be reached or sent an unreadable reply.".to_string())
            }
            Self::ProviderAuth(_) => {
                Some("HTTP providers read their API key from an environment variable.".to_string())
            }
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => Some(
                "Server errors are retried twice with backoff before giving up.".to_string(),
            ),
            Self::Timeout { .. } => Some(
                "Each gateway call carries its own timeout (defaults.call_timeout).".to_string(),
            ),
            Self::BudgetExceeded { .. } => {
                Some("llm.call_budget caps the number of calls per process.".to_string())
            }
            Self::Misconfiguration(_) | Self::Unsupported(_) => Some(
                "Provider settings live in the [llm] section of .clausecheck/config.toml."
                    .to_string(),
            ),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Verify network connectivity and the provider base_url".to_string(),
                "For Ollama, check that 'ollama serve' is running".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the API key environment variable (llm.openai.api_key_env) is set"
                    .to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Configure llm.fallback_provider to switch providers".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase --call-timeout".to_string(),
                "Lower --chunk-budget so each call carries less text".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Raise llm.call_budget in the configuration".to_string(),
                "Use --quick to skip the planning call".to_string(),
            ],
            Self::Misconfiguration(_) | Self::Unsupported(_) => vec![
                "Run 'clausecheck config' to inspect provider settings".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) | Self::ProviderOutage(_) | Self::Timeout { .. } => {
                ErrorCategory::ProviderIntegration
            }
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
        }
    }
}

impl UserFriendlyError for ReviewError {
    fn user_message(&self) -> String {
        match self {
            Self::Parse(err) => err.user_message(),
            Self::Schema(err) => err.user_message(),
            Self::Upstream(err) => err.user_message(),
            Self::Assembly(err) => err.user_message(),
            Self::Config(err) => err.user_message(),
            Self::Cancelled => "The review was cancelled before it finished".to_string(),
            Self::Internal(msg) => format!("Internal error: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Parse(err) => err.context(),
            Self::Schema(err) => err.context(),
            Self::Upstream(err) => err.context(),
            Self::Assembly(err) => err.context(),
            Self::Config(err) => err.context(),
            Self::Cancelled => {
                Some("Calls in flight were abandoned and their results discarded.".to_string())
            }
            Self::Internal(_) => Some("This indicates a bug in clausecheck.".to_string()),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Parse(err) => err.suggestions(),
            Self::Schema(err) => err.suggestions(),
            Self::Upstream(err) => err.suggestions(),
            Self::Assembly(err) => err.suggestions(),
            Self::Config(err) => err.suggestions(),
            Self::Cancelled => Vec::new(),
            Self::Internal(_) => {
                vec!["Re-run with --verbose and report the log output".to_string()]
            }
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(err) => err.category(),
            Self::Schema(err) => err.category(),
            Self::Upstream(err) => err.category(),
            Self::Assembly(err) => err.category(),
            Self::Config(err) => err.category(),
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl ReviewError {
    /// Get a user-friendly error message with context and actionable suggestions.
    ///
    /// Credentials are redacted from the rendered text.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        redact_credentials(&output)
    }

    /// Map this error to the CLI exit code.
    ///
    /// This is the single source of truth for exit codes; see the table on
    /// [`ReviewError`].
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Parse(_) => ExitCode::PARSE_FAILURE,
            Self::Schema(_) => ExitCode::SCHEMA_FAILURE,
            Self::Upstream(LlmError::Timeout { .. }) => ExitCode::CALL_TIMEOUT,
            Self::Upstream(LlmError::Misconfiguration(_) | LlmError::Unsupported(_)) => {
                ExitCode::CLI_ARGS
            }
            Self::Upstream(_) => ExitCode::UPSTREAM_FAILURE,
            Self::Assembly(_) | Self::Internal(_) => ExitCode::INTERNAL,
            Self::Cancelled => ExitCode::CANCELLED,
        }
    }

    /// Whether the error came from the model or its transport rather than
    /// from the input or a local defect.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}
