//! Logging and observability infrastructure for clausecheck
//!
//! Structured logging goes through `tracing`. The binary installs a subscriber
//! once via [`init_tracing`]; library code only emits events and spans.

use std::time::{Duration, Instant};
use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::redaction::redact_credentials;

/// Output shape of the log stream on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line records
    #[default]
    Compact,
    /// One JSON object per record
    Json,
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("clausecheck=debug,info")
            } else {
                EnvFilter::try_new("clausecheck=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber for structured logging
///
/// `RUST_LOG` overrides the default filter. Verbose mode raises clausecheck's
/// own targets to `debug` and reports span close timings.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(verbose);
    let span_events = if verbose {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_span_events(span_events)
                        .with_current_span(true),
                )
                .try_init()?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(verbose)
                        .with_thread_ids(false)
                        .with_thread_names(false)
                        .with_line_number(false)
                        .with_file(false)
                        .with_span_events(span_events)
                        .compact(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Create a span for one pipeline stage with structured fields
pub fn stage_span(run_id: &str, stage: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "review_stage",
        run_id = %run_id,
        stage = %stage,
    )
}

/// Log stage start with structured fields
pub fn log_stage_start(run_id: &str, stage: &str) {
    info!(run_id = %run_id, stage = %stage, "Stage started");
}

/// Log stage completion with duration
pub fn log_stage_complete(run_id: &str, stage: &str, duration_ms: u128) {
    info!(
        run_id = %run_id,
        stage = %stage,
        duration_ms = %duration_ms,
        "Stage completed"
    );
}

/// Log stage failure with context
///
/// Error messages are redacted so provider credentials never reach the logs.
pub fn log_stage_error(run_id: &str, stage: &str, error: &str, duration_ms: u128) {
    let sanitized_error = redact_credentials(error);
    error!(
        run_id = %run_id,
        stage = %stage,
        duration_ms = %duration_ms,
        error = %sanitized_error,
        "Stage failed"
    );
}

/// Wall-clock timer for a single stage.
#[derive(Debug)]
pub struct StageTimer {
    started: Instant,
}

impl StageTimer {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}
