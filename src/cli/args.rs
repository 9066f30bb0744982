//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and all subcommand enums.

use clap::{Args, Parser, Subcommand};
use clausecheck_engine::{Identity, ReviewBrief};
use std::path::PathBuf;

/// clausecheck - LLM-assisted contract review
#[derive(Parser, Debug)]
#[command(name = "clausecheck")]
#[command(about = "Review contracts with an LLM and produce a structured risk report")]
#[command(long_about = r#"
clausecheck splits a contract into sections, derives a review checklist from a
short brief, reviews the sections with an LLM and writes a report with an
original-vs-suggested comparison table.

EXAMPLES:
  # Full review as the first party of a purchase contract
  clausecheck review contract.txt --identity first --contract-type 采购合同 --focus 付款周期 --focus 违约责任

  # Quick review with the preset checklist, JSON and Markdown output
  clausecheck review contract.txt --identity second --contract-type 租赁合同 --quick --format both

  # Show how a document is split into sections (no LLM calls)
  clausecheck structure contract.txt

  # Show the effective configuration and where each value came from
  clausecheck config

CONFIGURATION:
  Precedence: CLI flags > environment > config file > defaults
  The config file is discovered upward from the working directory as
  .clausecheck/config.toml, or under $CLAUSECHECK_HOME. Use --config to
  point at a file explicitly.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to request from the LLM provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// LLM provider: openai or ollama
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Per-call timeout in seconds (5-3600)
    #[arg(long, global = true)]
    pub call_timeout: Option<u64>,

    /// Maximum concurrent review calls (1-16)
    #[arg(long, global = true)]
    pub max_concurrency: Option<usize>,

    /// Characters of contract text per review call
    #[arg(long = "chunk-budget", global = true)]
    pub chunk_budget: Option<usize>,

    /// Bypass the response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// The review brief: who the client is and what they care about.
#[derive(Args, Debug, Clone)]
pub struct BriefArgs {
    /// Client identity: first (甲方) or second (乙方)
    #[arg(long)]
    pub identity: Identity,

    /// Contract type, e.g. 采购合同
    #[arg(long = "contract-type")]
    pub contract_type: String,

    /// Focus point; repeat for several
    #[arg(long = "focus")]
    pub focus: Vec<String>,
}

impl BriefArgs {
    #[must_use]
    pub fn to_brief(&self) -> ReviewBrief {
        let focus_points = self
            .focus
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        ReviewBrief::new(self.identity, self.contract_type.trim(), focus_points)
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Review a contract and write the report
    ///
    /// EXAMPLES:
    ///   clausecheck review contract.txt --identity first --contract-type 采购合同 --focus 付款周期
    ///   clausecheck review contract.txt --identity second --contract-type 租赁合同 --quick --strict
    Review {
        /// Plain-text contract file
        file: PathBuf,

        #[command(flatten)]
        brief: BriefArgs,

        /// Skip the planning call and use the preset checklist
        #[arg(long)]
        quick: bool,

        /// Report format
        #[arg(long, value_parser = ["markdown", "json", "both"])]
        format: Option<String>,

        /// Directory for report files
        #[arg(long)]
        output_dir: Option<String>,

        /// Exit non-zero when some sections could not be analyzed
        #[arg(long)]
        strict: bool,

        /// Do not record this run in the review history
        #[arg(long)]
        no_history: bool,
    },

    /// Generate the review checklist only (stage 1) and print it as JSON
    Plan {
        #[command(flatten)]
        brief: BriefArgs,
    },

    /// Show the sections a document is split into (no LLM calls)
    Structure {
        /// Plain-text contract file
        file: PathBuf,

        /// 0-based line number of a heading; repeat to override detection
        #[arg(long = "heading-line")]
        heading_lines: Vec<usize>,

        /// Output sections as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with the source of each value
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and manage the review history
    #[command(subcommand)]
    History(HistoryCommands),
}

impl Commands {
    /// Operation name used in error reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Review { .. } => "review",
            Self::Plan { .. } => "plan",
            Self::Structure { .. } => "structure",
            Self::Config { .. } => "config",
            Self::History(_) => "history",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List recent reviews, newest first
    List {
        /// Maximum number of records
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show one review
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Search by file name, contract type or focus point
    Search {
        keyword: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete one review record
    Delete { id: String },

    /// Delete every review record
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Totals by status, contract type and provider
    Stats {
        #[arg(long)]
        json: bool,
    },
}
