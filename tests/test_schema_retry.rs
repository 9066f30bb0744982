//! Malformed model replies are retried once with a correction, then fail
//! the stage with a schema error.

mod test_support;

use camino::Utf8PathBuf;
use clausecheck::engine::{Orchestrator, RunContext, Stage};
use clausecheck::llm::CachedBackend;
use clausecheck::{ExitCode, ReviewError};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use test_support::{PAYMENT_PLAN, PURCHASE_CONTRACT, ScriptedBackend, Shared, purchase_brief};

#[tokio::test]
async fn test_planning_recovers_after_one_malformed_reply() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        "抱歉，我无法以 JSON 格式回答。",
        PAYMENT_PLAN,
    ]));
    let orchestrator = Orchestrator::new(backend.clone(), Default::default());

    let report = orchestrator
        .run(PURCHASE_CONTRACT, &purchase_brief())
        .await
        .unwrap();

    assert_eq!(backend.planning_calls.load(Ordering::SeqCst), 2);
    assert!(report.checklist.iter().any(|item| item.topic == "付款周期"));
}

#[tokio::test]
async fn test_planning_fails_after_retries() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        r#"{"contract_focus": []}"#,
        r#"{"specific_checks": "none"}"#,
    ]));
    let orchestrator = Orchestrator::new(backend.clone(), Default::default());
    let ctx = RunContext::new("bad-plan");

    let err = orchestrator
        .run_with(PURCHASE_CONTRACT, &purchase_brief(), &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Planning);
    assert!(matches!(err.error, ReviewError::Schema(_)));
    assert_eq!(err.to_exit_code(), ExitCode::SCHEMA_FAILURE);
    assert_eq!(backend.planning_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.review_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_review_reply_citing_unseen_section_is_retried() {
    use std::sync::atomic::AtomicU32;

    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    let backend = Arc::new(ScriptedBackend::new(vec![PAYMENT_PLAN]).with_responder(move |refs| {
        let n = seen.fetch_add(1, Ordering::SeqCst);
        let cited = if n == 0 { 99 } else { refs[0] };
        Ok(format!(
            r#"{{"findings": [{{"section_ref": {cited}, "risk_summary": "r", "severity": "低", "original_text": "", "suggested_text": "s", "rationale": "x"}}]}}"#
        ))
    }));
    let orchestrator = Orchestrator::new(backend.clone(), Default::default());

    let report = orchestrator
        .run(PURCHASE_CONTRACT, &purchase_brief())
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].section_ref, Some(0));
}

#[tokio::test]
async fn test_malformed_replies_are_not_served_from_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let cache_dir = Utf8PathBuf::from_path_buf(dir.path().join("responses")).unwrap();
    // Two junk planning replies, then the default plan for every later call
    let scripted = Arc::new(ScriptedBackend::new(vec!["not json", "still not json"]));
    let cached = CachedBackend::new(Box::new(Shared(Arc::clone(&scripted))), cache_dir);
    let orchestrator = Orchestrator::new(Arc::new(cached), Default::default());

    let err = orchestrator
        .run_with(PURCHASE_CONTRACT, &purchase_brief(), &RunContext::new("run-1"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Planning);
    assert_eq!(scripted.planning_calls.load(Ordering::SeqCst), 2);

    // The rejected replies were evicted, so the model is asked again
    let report = orchestrator
        .run_with(PURCHASE_CONTRACT, &purchase_brief(), &RunContext::new("run-2"))
        .await
        .unwrap();
    assert_eq!(scripted.planning_calls.load(Ordering::SeqCst), 3);
    assert!(report.checklist.iter().any(|item| item.topic == "付款周期"));

    // Accepted replies are still cached
    orchestrator
        .run_with(PURCHASE_CONTRACT, &purchase_brief(), &RunContext::new("run-3"))
        .await
        .unwrap();
    assert_eq!(scripted.planning_calls.load(Ordering::SeqCst), 3);
}
