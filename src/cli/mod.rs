//! Command-line interface for clausecheck
//!
//! ## Module Structure
//!
//! - `args`: CLI argument definitions and parsing structures (clap)
//! - `run`: Main entry point and command dispatch
//! - `commands`: Command implementations and helpers
//! - `tests`: Test module (cfg(test) only)

pub mod args;
mod commands;
mod run;


pub use args::{BriefArgs, Cli, Commands, HistoryCommands};
pub use run::run;
