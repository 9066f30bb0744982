//! clausecheck - LLM-assisted contract review with structured, verifiable findings
//!
//! A contract is split into numbered sections, a review checklist is derived
//! from a short brief, the sections are reviewed in bounded-size chunks and
//! the findings are assembled into a report whose "original text" column is
//! quoted from the source document rather than from the model.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! clausecheck review contract.txt --identity first --contract-type 采购合同 --focus 付款周期
//! clausecheck structure contract.txt
//! clausecheck history list
//! ```
//!
//! # Quick Start (Library)
//!
//! ```no_run
//! use std::sync::Arc;
//! use clausecheck::{Config, Identity, Orchestrator, ReviewBrief, ReviewSettings};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::discover(&clausecheck::CliArgs::default())?;
//! let (backend, _fallback) = clausecheck::llm::from_config_with_fallback(&config)?;
//! let orchestrator = Orchestrator::new(Arc::from(backend), ReviewSettings::from_config(&config));
//!
//! let brief = ReviewBrief::new(Identity::FirstParty, "采购合同", vec!["付款周期".into()]);
//! let report = orchestrator.run("第一条 付款\n甲方应于验收后九十日内付款。\n", &brief).await?;
//! println!("{}", clausecheck::render::render_markdown(&report, "采购合同"));
//! # Ok(())
//! # }
//! ```
//!
//! # JSON Contracts
//!
//! JSON reports and `--json` command output are emitted in JCS (RFC 8785)
//! canonical form; see [`emit_jcs`].

pub use clausecheck_config::{CliArgs, Config, ConfigBuilder};
pub use clausecheck_engine::{
    Checklist, ChecklistItem, Finding, Identity, Orchestrator, ProgressEvent, Provenance,
    ReportEntry, ReviewBrief, ReviewReport, ReviewSettings, RunContext, RunError, RunOutcome,
    Section, Severity, Stage,
};
pub use clausecheck_llm::LlmBackend;
pub use clausecheck_utils::canonicalization::emit_jcs;
pub use clausecheck_utils::error::{ErrorCategory, ReviewError, UserFriendlyError};
pub use clausecheck_utils::exit_codes::ExitCode;

#[doc(hidden)]
pub use clausecheck_config as config;
#[doc(hidden)]
pub use clausecheck_engine as engine;
#[doc(hidden)]
pub use clausecheck_llm as llm;
#[doc(hidden)]
pub use clausecheck_render as render;

pub mod cli;
pub mod history;

/// Version string reported by `--version`.
#[must_use]
pub fn clausecheck_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
