//! Findings come out in document order whatever the chunking and whatever
//! order the chunks complete in.

mod test_support;

use clausecheck::engine::{Orchestrator, ReviewSettings};
use clausecheck::emit_jcs;
use std::sync::Arc;
use std::time::Duration;
use test_support::{PAYMENT_PLAN, ScriptedBackend, one_section_per_chunk, purchase_brief};

fn long_contract() -> String {
    (1..=8)
        .map(|n| format!("第{n}条 条款{n}\n本条约定第{n}项义务，双方应遵守。\n\n"))
        .collect()
}

/// Later sections answer first.
fn reversed_delay(refs: &[usize]) -> Duration {
    let first = refs.first().copied().unwrap_or(0) as u64;
    Duration::from_millis((10 - first) * 15)
}

#[tokio::test]
async fn test_one_chunk_and_many_chunks_agree() {
    let contract = long_contract();

    let single = Orchestrator::new(
        Arc::new(ScriptedBackend::new(vec![PAYMENT_PLAN])),
        ReviewSettings::default(),
    );
    let single_report = single.run(&contract, &purchase_brief()).await.unwrap();
    assert_eq!(single_report.provenance.total_chunks, 1);

    let many = Orchestrator::new(
        Arc::new(ScriptedBackend::new(vec![PAYMENT_PLAN]).with_review_delay(reversed_delay)),
        one_section_per_chunk(8),
    );
    let many_report = many.run(&contract, &purchase_brief()).await.unwrap();
    assert_eq!(many_report.provenance.total_chunks, 8);

    let refs: Vec<Option<usize>> = many_report.entries.iter().map(|e| e.section_ref).collect();
    assert_eq!(refs, (0..8).map(Some).collect::<Vec<_>>());
    assert_eq!(
        emit_jcs(&single_report.entries).unwrap(),
        emit_jcs(&many_report.entries).unwrap()
    );
}

#[tokio::test]
async fn test_concurrency_limit_does_not_change_output() {
    let contract = long_contract();
    let mut outputs = Vec::new();

    for max_concurrency in [1, 3, 16] {
        let orchestrator = Orchestrator::new(
            Arc::new(ScriptedBackend::new(vec![PAYMENT_PLAN]).with_review_delay(reversed_delay)),
            one_section_per_chunk(max_concurrency),
        );
        let report = orchestrator.run(&contract, &purchase_brief()).await.unwrap();
        outputs.push(emit_jcs(&report.entries).unwrap());
    }

    assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
}
