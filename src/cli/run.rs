//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Installs logging and creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;
use clausecheck_config::{CliArgs, Config};
use clausecheck_engine::RunError;
use clausecheck_llm::LlmError;
use clausecheck_utils::error::{ConfigError, ReviewError, UserFriendlyError};
use clausecheck_utils::exit_codes::ExitCode;
use clausecheck_utils::logging::{LogFormat, init_tracing};
use clausecheck_utils::redaction::redact_credentials;

use super::args::{Cli, Commands};
use super::commands;

/// Main CLI execution function.
///
/// This function handles ALL output including errors. It returns `Result<(), ExitCode>`:
/// - On success: returns `Ok(())` after printing any output
/// - On error: prints the error report and returns `Err(ExitCode)`
///
/// main.rs only calls `std::process::exit(code.as_i32())` on error.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    let cli_args = cli_args_from(&cli);

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", render_error(&err, "config"));
            return Err(exit_code_for(&err));
        }
    };

    let verbose = cli.verbose || config.defaults.verbose.unwrap_or(false);
    let log_format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = init_tracing(verbose, log_format) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let operation = cli.command.name();
    let result = rt.block_on(commands::dispatch(cli.command, &config));

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            eprintln!("{}", render_error(&error, operation));
            Err(exit_code_for(&error))
        }
    }
}

/// Build configuration overrides from the parsed command line.
pub(crate) fn cli_args_from(cli: &Cli) -> CliArgs {
    let (output_format, output_dir) = match &cli.command {
        Commands::Review {
            format, output_dir, ..
        } => (format.clone(), output_dir.clone()),
        _ => (None, None),
    };

    CliArgs {
        config_path: cli.config.clone(),
        model: cli.model.clone(),
        llm_provider: cli.provider.clone(),
        call_timeout: cli.call_timeout,
        max_concurrency: cli.max_concurrency,
        chunk_budget_chars: cli.chunk_budget,
        output_dir,
        output_format,
        verbose: cli.verbose.then_some(true),
        no_cache: cli.no_cache,
    }
}

/// Exit code for an error that reached the top level.
pub(crate) fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    if let Some(run_error) = error.downcast_ref::<RunError>() {
        return run_error.to_exit_code();
    }
    if let Some(review_error) = error.downcast_ref::<ReviewError>() {
        return review_error.to_exit_code();
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return ExitCode::CLI_ARGS;
    }
    if let Some(llm_error) = error.downcast_ref::<LlmError>() {
        return match llm_error {
            LlmError::Timeout { .. } => ExitCode::CALL_TIMEOUT,
            LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CLI_ARGS,
            _ => ExitCode::UPSTREAM_FAILURE,
        };
    }
    ExitCode::INTERNAL
}

/// Render an error for stderr with context and suggestions where known.
pub(crate) fn render_error(error: &anyhow::Error, operation: &str) -> String {
    let mut out = if let Some(run_error) = error.downcast_ref::<RunError>() {
        let mut out = format!(
            "✗ {operation} failed during {}\n\n{}",
            run_error.stage,
            run_error.error.display_for_user()
        );
        if run_error.has_partial_results() {
            out.push_str(&format!(
                "\n{} findings had been gathered before the failure and were discarded.\n",
                run_error.partial_findings
            ));
        }
        out
    } else if let Some(review_error) = error.downcast_ref::<ReviewError>() {
        format!("✗ {operation} failed\n\n{}", review_error.display_for_user())
    } else if let Some(llm_error) = error.downcast_ref::<LlmError>() {
        friendly(operation, llm_error)
    } else if let Some(config_error) = error.downcast_ref::<ConfigError>() {
        friendly(operation, config_error)
    } else {
        let mut out = format!("✗ {operation} failed: {error:#}\n");
        out.push_str("\n  Run with --verbose for more detailed output\n");
        out
    };

    if !out.ends_with('\n') {
        out.push('\n');
    }
    redact_credentials(&out)
}

fn friendly(operation: &str, error: &dyn UserFriendlyError) -> String {
    let mut out = format!("✗ {operation} failed\n\nError: {}\n", error.user_message());
    if let Some(ctx) = error.context() {
        out.push_str(&format!("\nContext: {ctx}\n"));
    }
    let suggestions = error.suggestions();
    if !suggestions.is_empty() {
        out.push_str("\nSuggestions:\n");
        for suggestion in suggestions {
            out.push_str(&format!("  • {suggestion}\n"));
        }
    }
    out
}
