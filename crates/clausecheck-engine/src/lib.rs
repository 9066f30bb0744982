//! clausecheck-engine - contract review pipeline
//!
//! Structures a contract into sections, derives a checklist from the review
//! brief, reviews the sections in bounded-concurrent chunks and assembles
//! the findings into a [`ReviewReport`]. All model traffic goes through the
//! [`Gateway`] over an abstract `LlmBackend`.

pub mod analyzer;
pub mod assembler;
pub mod extract;
pub mod gateway;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod settings;
pub mod structurer;

pub use analyzer::{AnalysisOutcome, Analyzer, Chunk, ChunkFailure, plan_chunks};
pub use assembler::assemble;
pub use gateway::Gateway;
pub use model::{
    Checklist, ChecklistItem, Finding, Identity, Provenance, ReportEntry, ReviewBrief,
    ReviewReport, RunOutcome, Section, Severity, Stage, UnanalyzedSection,
};
pub use orchestrator::{Orchestrator, ProgressEvent, RunContext, RunError, RunState};
pub use planner::{Planner, preset_checklist};
pub use settings::ReviewSettings;
pub use structurer::{StructureHints, structure, structure_with_hints};

pub use tokio_util::sync::CancellationToken;
