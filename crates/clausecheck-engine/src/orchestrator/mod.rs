//! Workflow Orchestrator
//!
//! Sequences structuring, planning, analysis and assembly for one document,
//! drives the run state machine and reports progress. Every failure leaves
//! through [`RunError`], tagged with the stage it happened in.

mod context;
mod progress;
mod state;

pub use context::RunContext;
pub use progress::ProgressEvent;
pub use state::RunState;

use chrono::Utc;
use clausecheck_llm::LlmBackend;
use clausecheck_utils::error::ReviewError;
use clausecheck_utils::exit_codes::ExitCode;
use clausecheck_utils::logging::{
    StageTimer, log_stage_complete, log_stage_error, log_stage_start, stage_span,
};
use clausecheck_utils::redaction::redact_credentials;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

use crate::analyzer::Analyzer;
use crate::assembler::assemble;
use crate::gateway::Gateway;
use crate::model::{Checklist, ReviewBrief, ReviewReport, Stage};
use crate::planner::{Planner, preset_checklist};
use crate::settings::ReviewSettings;
use crate::structurer::structure;
use progress::{
    MSG_ASSEMBLING, MSG_DONE, MSG_DONE_DEGRADED, MSG_PLANNING, MSG_PLANNING_PRESET,
    MSG_STRUCTURING, analyzing_message,
};

/// A run that did not produce a report.
#[derive(Debug, thiserror::Error)]
#[error("review failed during {stage}: {error}")]
pub struct RunError {
    /// Stage in which the first non-recoverable error occurred
    pub stage: Stage,
    #[source]
    pub error: ReviewError,
    /// Findings that had been gathered before the failure
    pub partial_findings: usize,
}

impl RunError {
    #[must_use]
    pub fn has_partial_results(&self) -> bool {
        self.partial_findings > 0
    }

    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        self.error.to_exit_code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChecklistSource {
    Planner,
    Preset,
}

/// Runs reviews against one backend with fixed settings.
///
/// The orchestrator holds no per-run state; concurrent runs each get their
/// own [`RunState`] and [`RunContext`].
pub struct Orchestrator {
    gateway: Arc<Gateway>,
    planner: Planner,
    analyzer: Analyzer,
    settings: ReviewSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, settings: ReviewSettings) -> Self {
        let gateway = Arc::new(Gateway::new(backend, &settings));
        let planner = Planner::new(Arc::clone(&gateway), settings.planning_temperature);
        let analyzer = Analyzer::new(
            Arc::clone(&gateway),
            settings.max_concurrency,
            settings.chunk_budget_chars,
            settings.review_temperature,
        );
        Self {
            gateway,
            planner,
            analyzer,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.gateway.provider_name()
    }

    /// Review `raw_document` with a fresh run context.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] tagged with the failing stage.
    pub async fn run(&self, raw_document: &str, brief: &ReviewBrief) -> Result<ReviewReport, RunError> {
        let ctx = RunContext::for_document(raw_document);
        self.run_with(raw_document, brief, &ctx).await
    }

    /// Review `raw_document` under a caller-supplied context, which carries
    /// the cancellation token and progress channel.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] tagged with the failing stage.
    pub async fn run_with(
        &self,
        raw_document: &str,
        brief: &ReviewBrief,
        ctx: &RunContext,
    ) -> Result<ReviewReport, RunError> {
        self.execute(raw_document, brief, ctx, ChecklistSource::Planner)
            .await
    }

    /// Review with the preset checklist instead of a planning call.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] tagged with the failing stage.
    pub async fn run_quick(
        &self,
        raw_document: &str,
        brief: &ReviewBrief,
        ctx: &RunContext,
    ) -> Result<ReviewReport, RunError> {
        self.execute(raw_document, brief, ctx, ChecklistSource::Preset)
            .await
    }

    /// Run the planning stage alone.
    ///
    /// # Errors
    ///
    /// Any planner error; see [`Planner::plan`].
    pub async fn plan_only(&self, ctx: &RunContext, brief: &ReviewBrief) -> Result<Checklist, ReviewError> {
        self.planner
            .plan(ctx, brief)
            .instrument(stage_span(&ctx.run_id, Stage::Planning.as_str()))
            .await
    }

    async fn execute(
        &self,
        raw_document: &str,
        brief: &ReviewBrief,
        ctx: &RunContext,
        source: ChecklistSource,
    ) -> Result<ReviewReport, RunError> {
        let timer = StageTimer::start();
        info!(
            run_id = %ctx.run_id,
            provider = %self.provider_name(),
            model = %self.settings.model,
            quick = source == ChecklistSource::Preset,
            document_chars = raw_document.chars().count(),
            "Review run started"
        );

        let mut state = RunState::new(brief.clone());
        match self.drive(raw_document, ctx, source, &mut state).await {
            Ok(report) => {
                info!(
                    run_id = %ctx.run_id,
                    findings = report.findings.len(),
                    degraded = report.provenance.is_degraded(),
                    duration_ms = timer.elapsed_ms() as u64,
                    "Review run finished"
                );
                Ok(report)
            }
            Err(error) => {
                let stage = state.fail();
                let message = redact_credentials(&error.to_string());
                log_stage_error(&ctx.run_id, stage.as_str(), &message, timer.elapsed_ms());
                ctx.emit(Stage::Failed, format!("{stage}: {message}"));
                Err(RunError {
                    stage,
                    error,
                    partial_findings: state.findings().len(),
                })
            }
        }
    }

    async fn drive(
        &self,
        raw_document: &str,
        ctx: &RunContext,
        source: ChecklistSource,
        state: &mut RunState,
    ) -> Result<ReviewReport, ReviewError> {
        let run_id = ctx.run_id.as_str();

        ensure_active(ctx)?;
        ctx.emit(Stage::Structuring, MSG_STRUCTURING);
        log_stage_start(run_id, Stage::Structuring.as_str());
        let timer = StageTimer::start();
        state.record_sections(structure(raw_document)?);
        log_stage_complete(run_id, Stage::Structuring.as_str(), timer.elapsed_ms());

        state.advance(Stage::Planning)?;
        ensure_active(ctx)?;
        log_stage_start(run_id, Stage::Planning.as_str());
        let timer = StageTimer::start();
        let checklist = match source {
            ChecklistSource::Planner => {
                ctx.emit(Stage::Planning, MSG_PLANNING);
                self.plan_only(ctx, state.brief()).await?
            }
            ChecklistSource::Preset => {
                ctx.emit(Stage::Planning, MSG_PLANNING_PRESET);
                preset_checklist(state.brief())
            }
        };
        state.record_checklist(checklist);
        log_stage_complete(run_id, Stage::Planning.as_str(), timer.elapsed_ms());

        state.advance(Stage::Analyzing)?;
        ensure_active(ctx)?;
        let checklist = state.checklist().ok_or_else(|| missing("checklist"))?;
        let chunk_count = self
            .analyzer
            .plan(state.brief().identity, &checklist.items, state.sections())
            .len();
        ctx.emit(
            Stage::Analyzing,
            analyzing_message(state.sections().len(), chunk_count),
        );
        log_stage_start(run_id, Stage::Analyzing.as_str());
        let timer = StageTimer::start();
        let outcome = self
            .analyzer
            .analyze(ctx, state.brief().identity, state.sections(), &checklist.items)
            .instrument(stage_span(run_id, Stage::Analyzing.as_str()))
            .await?;
        state.record_analysis(outcome);
        log_stage_complete(run_id, Stage::Analyzing.as_str(), timer.elapsed_ms());

        state.advance(Stage::Assembling)?;
        ensure_active(ctx)?;
        ctx.emit(Stage::Assembling, MSG_ASSEMBLING);
        log_stage_start(run_id, Stage::Assembling.as_str());
        let timer = StageTimer::start();
        let report = {
            let checklist = state.checklist().ok_or_else(|| missing("checklist"))?;
            let analysis = state.analysis().ok_or_else(|| missing("analysis"))?;
            assemble(
                state.brief(),
                checklist,
                &analysis.findings,
                state.sections(),
                Utc::now(),
                analysis.provenance(state.sections()),
            )?
        };
        log_stage_complete(run_id, Stage::Assembling.as_str(), timer.elapsed_ms());

        state.advance(Stage::Done)?;
        if report.provenance.is_degraded() {
            warn!(
                run_id = %run_id,
                failed_chunks = ?report.provenance.failed_chunks,
                unanalyzed_sections = report.provenance.unanalyzed_sections.len(),
                "Review completed with unanalyzed sections"
            );
            ctx.emit(Stage::Done, MSG_DONE_DEGRADED);
        } else {
            ctx.emit(Stage::Done, MSG_DONE);
        }
        Ok(report)
    }
}

fn ensure_active(ctx: &RunContext) -> Result<(), ReviewError> {
    if ctx.is_cancelled() {
        return Err(ReviewError::Cancelled);
    }
    Ok(())
}

fn missing(what: &str) -> ReviewError {
    ReviewError::Internal(format!("{what} was not recorded before assembly"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Identity, RunOutcome};
    use async_trait::async_trait;
    use clausecheck_llm::{LlmError, LlmInvocation, LlmResult};
    use clausecheck_utils::error::{ParseError, SchemaError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    const CONTRACT: &str = "第一条 付款方式\n乙方应在收货后90日内付款。\n\n第二条 违约责任\n违约金为合同总额的50%。\n";

    /// Answers by stage: a fixed checklist for planning, one finding on the
    /// first section of each review chunk.
    struct Canned {
        planning_reply: &'static str,
        calls: AtomicU32,
    }

    impl Canned {
        fn new(planning_reply: &'static str) -> Self {
            Self {
                planning_reply,
                calls: AtomicU32::new(0),
            }
        }
    }

    fn first_section_ref(prompt: &str) -> usize {
        let start = prompt.find("\n[§").expect("prompt has sections") + "\n[§".len();
        let digits: String = prompt[start..].chars().take_while(char::is_ascii_digit).collect();
        digits.parse().unwrap()
    }

    #[async_trait]
    impl LlmBackend for Canned {
        async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = if inv.stage == "planning" {
                self.planning_reply.to_string()
            } else {
                let section = first_section_ref(&inv.messages[1].content);
                format!(
                    r#"{{"findings": [{{"section_ref": {section}, "risk_summary": "付款周期过长", "severity": "高",
                        "original_text": "x", "suggested_text": "乙方应在收货后30日内付款。", "rationale": "占用资金"}}]}}"#
                )
            };
            Ok(LlmResult::new(reply, "canned", inv.model))
        }

        fn provider_name(&self) -> &str {
            "canned"
        }
    }

    const PLAN: &str = r#"{"contract_focus": ["付款条款"], "specific_checks": [{"point": "付款周期", "logic": "期限是否合理"}]}"#;

    fn brief() -> ReviewBrief {
        ReviewBrief::new(Identity::FirstParty, "采购合同", vec!["付款周期".to_string()])
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_run_reports_every_stage() {
        let orchestrator = Orchestrator::new(Arc::new(Canned::new(PLAN)), ReviewSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new("run-1").with_progress(tx);

        let report = orchestrator.run_with(CONTRACT, &brief(), &ctx).await.unwrap();

        assert_eq!(report.checklist[0].topic, "付款周期");
        assert_eq!(report.focus_areas, vec!["付款条款"]);
        assert_eq!(report.entries[0].section_title.as_deref(), Some("第一条 付款方式"));
        assert_eq!(report.provenance.outcome, RunOutcome::Complete);

        let stages: Vec<Stage> = drain(&mut rx).into_iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Structuring,
                Stage::Planning,
                Stage::Analyzing,
                Stage::Assembling,
                Stage::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_quick_run_skips_planning_call() {
        let backend = Arc::new(Canned::new("never used"));
        let orchestrator = Orchestrator::new(backend.clone(), ReviewSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new("run-1").with_progress(tx);

        let report = orchestrator.run_quick(CONTRACT, &brief(), &ctx).await.unwrap();

        assert_eq!(report.checklist[0].topic, "合规性审查");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let events = drain(&mut rx);
        assert_eq!(events[1].stage, Stage::Planning);
        assert_eq!(events[1].message, MSG_PLANNING_PRESET);
    }

    #[tokio::test]
    async fn test_empty_document_fails_in_structuring() {
        let backend = Arc::new(Canned::new(PLAN));
        let orchestrator = Orchestrator::new(backend.clone(), ReviewSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunContext::new("run-1").with_progress(tx);

        let err = orchestrator.run_with(" \n\n", &brief(), &ctx).await.unwrap_err();

        assert_eq!(err.stage, Stage::Structuring);
        assert!(matches!(err.error, ReviewError::Parse(ParseError::EmptyDocument)));
        assert!(!err.has_partial_results());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

        let events = drain(&mut rx);
        assert_eq!(events.last().unwrap().stage, Stage::Failed);
    }

    #[tokio::test]
    async fn test_malformed_plan_fails_in_planning() {
        let backend = Arc::new(Canned::new("抱歉，我无法回答"));
        let orchestrator = Orchestrator::new(backend.clone(), ReviewSettings::default());

        let err = orchestrator.run(CONTRACT, &brief()).await.unwrap_err();

        assert_eq!(err.stage, Stage::Planning);
        assert!(matches!(
            err.error,
            ReviewError::Schema(SchemaError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(err.to_exit_code(), err.error.to_exit_code());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(err.to_string().starts_with("review failed during planning"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = Arc::new(Canned::new(PLAN));
        let orchestrator = Orchestrator::new(backend.clone(), ReviewSettings::default());
        let ctx = RunContext::new("run-1");
        ctx.cancel.cancel();

        let err = orchestrator.run_with(CONTRACT, &brief(), &ctx).await.unwrap_err();
        assert_eq!(err.stage, Stage::Structuring);
        assert!(matches!(err.error, ReviewError::Cancelled));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
