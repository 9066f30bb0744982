use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::Utc;
use clausecheck_config::Config;
use clausecheck_engine::{ReviewBrief, ReviewReport, RunContext, Severity};
use clausecheck_render::{ReportFormat, ReportWriter};
use clausecheck_utils::exit_codes::ExitCode;
use clausecheck_utils::redaction::redact_credentials;
use std::path::PathBuf;
use tracing::warn;

use super::common::{
    build_orchestrator, cancel_on_ctrl_c, contract_name, read_document, with_progress_printer,
};
use crate::history::{ReviewHistory, ReviewRecord, ReviewStatus};

pub struct ReviewOptions {
    pub file: PathBuf,
    pub brief: ReviewBrief,
    pub quick: bool,
    pub strict: bool,
    pub record_history: bool,
}

/// Execute the review command
pub async fn execute_review_command(options: ReviewOptions, config: &Config) -> Result<ExitCode> {
    let raw = read_document(&options.file)?;
    let name = contract_name(&options.file);
    let formats = ReportFormat::parse_selection(config.output_format())?;
    let writer = ReportWriter::new(output_dir(config)?);

    let orchestrator = build_orchestrator(config)?;
    let provider = orchestrator.provider_name().to_string();
    let model = orchestrator.settings().model.clone();

    let (cancel, ctrl_c) = cancel_on_ctrl_c();
    let (ctx, printer) =
        with_progress_printer(RunContext::for_document(&raw).with_cancel(cancel));

    let outcome = if options.quick {
        orchestrator.run_quick(&raw, &options.brief, &ctx).await
    } else {
        orchestrator.run_with(&raw, &options.brief, &ctx).await
    };

    drop(ctx);
    ctrl_c.abort();
    if let Err(err) = printer.await {
        warn!(error = %err, "Progress printer stopped unexpectedly");
    }

    let base_record = |status| {
        ReviewRecord::new(
            &options.file,
            &options.brief,
            provider.as_str(),
            model.as_str(),
            status,
            Utc::now(),
        )
    };

    let report = match outcome {
        Ok(report) => report,
        Err(run_error) => {
            if options.record_history {
                let message = redact_credentials(&run_error.to_string());
                record(config, base_record(ReviewStatus::Failed).with_error(message));
            }
            return Err(anyhow::Error::new(run_error));
        }
    };

    let paths = writer.write_all(&report, &name, &formats)?;
    for path in &paths {
        println!("报告已生成: {path}");
    }
    println!("{}", summarize(&report));

    let degraded = report.provenance.is_degraded();
    if degraded {
        print_degraded_notice(&report);
    }

    if options.record_history {
        let status = if degraded {
            ReviewStatus::Degraded
        } else {
            ReviewStatus::Success
        };
        let mut entry = base_record(status).with_summary(summarize(&report));
        if let Some(path) = paths.first() {
            entry = entry.with_report_path(path.as_str());
        }
        record(config, entry);
    }

    if degraded && options.strict {
        return Ok(ExitCode::DEGRADED);
    }
    Ok(ExitCode::SUCCESS)
}

fn output_dir(config: &Config) -> Result<Utf8PathBuf> {
    let dir = config.output_dir();
    Utf8PathBuf::from_path_buf(dir)
        .map_err(|dir| anyhow::anyhow!("Output directory is not valid UTF-8: {}", dir.display()))
}

/// One-line summary: total findings and counts per severity.
pub(crate) fn summarize(report: &ReviewReport) -> String {
    let count = |severity: Severity| {
        report
            .entries
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    };
    format!(
        "发现 {} 个风险点（高 {} / 中 {} / 低 {}）",
        report.entries.len(),
        count(Severity::High),
        count(Severity::Medium),
        count(Severity::Low)
    )
}

fn print_degraded_notice(report: &ReviewReport) {
    let provenance = &report.provenance;
    eprintln!(
        "⚠ {} of {} chunks could not be analyzed; these sections were not reviewed:",
        provenance.failed_chunks.len(),
        provenance.total_chunks
    );
    for section in &provenance.unanalyzed_sections {
        eprintln!("    §{} {}", section.index, section.title);
    }
}

/// History is best effort: a failed write never fails the review.
fn record(config: &Config, entry: ReviewRecord) {
    let path = config.history_path();
    let result = ReviewHistory::load(&path).and_then(|mut history| history.add(entry).map(|_| ()));
    if let Err(err) = result {
        warn!(path = %path.display(), error = %format!("{err:#}"), "Failed to record review history");
    }
}
