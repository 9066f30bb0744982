use anyhow::Result;
use clausecheck_config::Config;
use clausecheck_engine::{ReviewBrief, RunContext};
use clausecheck_utils::canonicalization::emit_jcs;
use clausecheck_utils::exit_codes::ExitCode;

use super::common::{build_orchestrator, cancel_on_ctrl_c};

/// Run the planning stage alone and print the checklist as canonical JSON.
pub async fn execute_plan_command(brief: &ReviewBrief, config: &Config) -> Result<ExitCode> {
    let orchestrator = build_orchestrator(config)?;
    let (cancel, ctrl_c) = cancel_on_ctrl_c();
    let ctx = RunContext::new(format!("plan-{}", brief.contract_type)).with_cancel(cancel);

    let result = orchestrator.plan_only(&ctx, brief).await;
    ctrl_c.abort();

    let checklist = result?;
    println!("{}", emit_jcs(&checklist)?);
    Ok(ExitCode::SUCCESS)
}
