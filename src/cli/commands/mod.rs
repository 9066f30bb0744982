//! CLI command implementations.
//!
//! `dispatch` routes a parsed [`Commands`] value to its handler. Handlers
//! print their own output and return the exit code for a completed run;
//! failures are returned as errors and rendered by `run.rs`.

mod common;
mod config;
mod history;
mod plan;
mod review;
mod structure;

use anyhow::Result;
use clausecheck_config::Config;
use clausecheck_utils::exit_codes::ExitCode;

use super::args::Commands;

pub use common::{build_orchestrator, contract_name, read_document};
pub use config::execute_config_command;
pub use history::execute_history_command;
pub use plan::execute_plan_command;
pub use review::{ReviewOptions, execute_review_command};
pub use structure::execute_structure_command;

/// Run `command` against the discovered configuration.
pub async fn dispatch(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Review {
            file,
            brief,
            quick,
            strict,
            no_history,
            ..
        } => {
            let options = ReviewOptions {
                file,
                brief: brief.to_brief(),
                quick,
                strict,
                record_history: !no_history,
            };
            execute_review_command(options, config).await
        }
        Commands::Plan { brief } => execute_plan_command(&brief.to_brief(), config).await,
        Commands::Structure {
            file,
            heading_lines,
            json,
        } => execute_structure_command(&file, heading_lines, json),
        Commands::Config { json } => execute_config_command(config, json),
        Commands::History(sub) => execute_history_command(sub, config),
    }
}
