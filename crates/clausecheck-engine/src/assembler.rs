//! Report Assembler
//!
//! Resolves every finding against the section list captured at structuring
//! time, deduplicates, and builds the immutable `ReviewReport`. The output is
//! a pure function of its inputs; `generated_at` is passed in.

use chrono::{DateTime, Utc};
use clausecheck_utils::canonicalization::content_digest;
use clausecheck_utils::error::AssemblyError;
use std::collections::HashMap;

use crate::model::{
    Checklist, Finding, Provenance, ReportEntry, ReviewBrief, ReviewReport, Section,
};

/// Build the report.
///
/// Findings sharing `(section_ref, risk_summary)` collapse into one entry
/// that keeps the highest severity at the position of the first occurrence.
///
/// # Errors
///
/// Returns `AssemblyError::UnknownSection` when a finding cites a section
/// that does not exist. The analyzer rejects such replies, so this is a defect.
pub fn assemble(
    brief: &ReviewBrief,
    checklist: &Checklist,
    findings: &[Finding],
    sections: &[Section],
    generated_at: DateTime<Utc>,
    provenance: Provenance,
) -> Result<ReviewReport, AssemblyError> {
    for (position, finding) in findings.iter().enumerate() {
        if let Some(section_ref) = finding.section_ref
            && section_ref >= sections.len()
        {
            return Err(AssemblyError::UnknownSection {
                finding: position,
                section_ref,
                section_count: sections.len(),
            });
        }
    }

    let findings = dedup_findings(findings);
    let entries = findings
        .iter()
        .map(|finding| build_entry(finding, sections))
        .collect();

    let document: String = sections.iter().map(|s| s.body.as_str()).collect();

    Ok(ReviewReport {
        brief: brief.clone(),
        focus_areas: checklist.focus_areas.clone(),
        checklist: checklist.items.clone(),
        findings,
        entries,
        provenance,
        document_digest: content_digest(&document),
        generated_at,
    })
}

fn dedup_findings(findings: &[Finding]) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    let mut positions: HashMap<(Option<usize>, &str), usize> = HashMap::new();

    for finding in findings {
        let key = (finding.section_ref, finding.risk_summary.trim());
        match positions.get(&key) {
            Some(&position) => {
                if finding.severity > kept[position].severity {
                    kept[position] = finding.clone();
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(finding.clone());
            }
        }
    }
    kept
}

fn build_entry(finding: &Finding, sections: &[Section]) -> ReportEntry {
    let section = finding.section_ref.and_then(|index| sections.get(index));

    // Verbatim section text always wins over the model's quote
    let original_text = match section {
        Some(section) => section.body.trim().to_string(),
        None => finding.original_text.clone(),
    };

    ReportEntry {
        section_ref: finding.section_ref,
        section_title: section.map(|s| s.title.clone()),
        risk_summary: finding.risk_summary.clone(),
        severity: finding.severity,
        original_text,
        suggested_text: finding.suggested_text.clone(),
        rationale: finding.rationale.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChecklistItem, Identity, Severity};
    use chrono::TimeZone;
    use clausecheck_utils::canonicalization::emit_jcs;
    use proptest::prelude::*;

    fn sections() -> Vec<Section> {
        vec![
            Section {
                index: 0,
                title: "第一条 付款方式".to_string(),
                body: "第一条 付款方式\n乙方应在收货后90日内付款。\n".to_string(),
            },
            Section {
                index: 1,
                title: "第二条 违约责任".to_string(),
                body: "第二条 违约责任\n违约金为合同总额的50%。\n".to_string(),
            },
        ]
    }

    fn brief() -> ReviewBrief {
        ReviewBrief::new(Identity::FirstParty, "买卖合同", vec!["付款周期".to_string()])
    }

    fn checklist() -> Checklist {
        Checklist {
            focus_areas: vec!["付款条款".to_string()],
            items: vec![ChecklistItem::new("付款周期", "期限是否合理")],
        }
    }

    fn finding(section_ref: Option<usize>, risk: &str, severity: Severity) -> Finding {
        Finding {
            section_ref,
            risk_summary: risk.to_string(),
            original_text: "模型引用的原文".to_string(),
            suggested_text: "建议文本".to_string(),
            rationale: "理由".to_string(),
            severity,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_verbatim_text_replaces_model_quote() {
        let report = assemble(
            &brief(),
            &checklist(),
            &[finding(Some(0), "付款周期过长", Severity::High)],
            &sections(),
            at(),
            Provenance::complete(1),
        )
        .unwrap();

        let entry = &report.entries[0];
        assert_eq!(entry.section_title.as_deref(), Some("第一条 付款方式"));
        assert_eq!(entry.original_text, "第一条 付款方式\n乙方应在收货后90日内付款。");
        assert_eq!(report.findings[0].original_text, "模型引用的原文");
        assert_eq!(report.focus_areas, vec!["付款条款"]);
    }

    #[test]
    fn test_global_finding_keeps_model_quote() {
        let report = assemble(
            &brief(),
            &checklist(),
            &[finding(None, "缺少管辖条款", Severity::Low)],
            &sections(),
            at(),
            Provenance::complete(1),
        )
        .unwrap();
        assert_eq!(report.entries[0].section_title, None);
        assert_eq!(report.entries[0].original_text, "模型引用的原文");
    }

    #[test]
    fn test_dedup_keeps_highest_severity_at_first_position() {
        let findings = vec![
            finding(Some(1), "违约金过高", Severity::Low),
            finding(Some(0), "付款周期过长", Severity::Medium),
            finding(Some(1), " 违约金过高 ", Severity::High),
            finding(Some(0), "付款周期过长", Severity::Low),
        ];
        let report = assemble(&brief(), &checklist(), &findings, &sections(), at(), Provenance::complete(2))
            .unwrap();

        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.findings[0].section_ref, Some(1));
        assert_eq!(report.findings[0].severity, Severity::High);
        assert_eq!(report.findings[1].severity, Severity::Medium);
    }

    #[test]
    fn test_unknown_section_is_defect() {
        let err = assemble(
            &brief(),
            &checklist(),
            &[finding(Some(0), "a", Severity::Low), finding(Some(5), "b", Severity::Low)],
            &sections(),
            at(),
            Provenance::complete(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            AssemblyError::UnknownSection {
                finding: 1,
                section_ref: 5,
                section_count: 2
            }
        );
    }

    #[test]
    fn test_document_digest_covers_source_text() {
        let report = assemble(&brief(), &checklist(), &[], &sections(), at(), Provenance::complete(1))
            .unwrap();
        let source: String = sections().iter().map(|s| s.body.as_str()).collect();
        assert_eq!(report.document_digest, content_digest(&source));
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![Just(Severity::Low), Just(Severity::Medium), Just(Severity::High)]
    }

    proptest! {
        #[test]
        fn prop_assembly_is_deterministic(
            raw in proptest::collection::vec(
                (proptest::option::of(0usize..2), "[ab]{1,2}", severity_strategy()),
                0..12,
            )
        ) {
            let findings: Vec<Finding> = raw
                .into_iter()
                .map(|(section_ref, risk, severity)| finding(section_ref, &risk, severity))
                .collect();

            let first = assemble(&brief(), &checklist(), &findings, &sections(), at(), Provenance::complete(1)).unwrap();
            let second = assemble(&brief(), &checklist(), &findings, &sections(), at(), Provenance::complete(1)).unwrap();
            prop_assert_eq!(emit_jcs(&first).unwrap(), emit_jcs(&second).unwrap());

            // No two findings share a dedup key
            let mut keys: Vec<_> = first.findings.iter().map(|f| (f.section_ref, f.risk_summary.clone())).collect();
            let before = keys.len();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), before);
        }
    }
}
