use anyhow::{Context, Result};
use clausecheck_engine::ReviewReport;
use clausecheck_utils::canonicalization::emit_jcs;

/// Emit `report` as RFC 8785 canonical JSON.
///
/// # Errors
///
/// Returns an error if the report cannot be serialized.
pub fn render_json(report: &ReviewReport) -> Result<String> {
    emit_jcs(report).context("Failed to serialize review report")
}
