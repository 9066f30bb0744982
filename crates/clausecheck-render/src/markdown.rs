//! Markdown report layout.

use clausecheck_engine::{ReportEntry, ReviewReport};
use std::fmt::Write as _;

pub const DISCLAIMER: &str = "本报告由AI助手生成，仅供参考，不构成法律意见。请在签署任何法律文件前咨询专业律师。本助手不对使用本报告造成的任何后果承担责任。";

/// Name shown when the caller has no document name.
pub const UNKNOWN_NAME: &str = "未知";

/// Render `report` in the Chinese report layout.
///
/// The output depends only on its inputs, so identical reports render to
/// identical bytes.
#[must_use]
pub fn render_markdown(report: &ReviewReport, contract_name: &str) -> String {
    let mut out = String::new();
    let contract_name = if contract_name.trim().is_empty() {
        UNKNOWN_NAME
    } else {
        contract_name
    };

    out.push_str("# 合同审查报告\n\n");
    write_basic_info(&mut out, report, contract_name);
    write_checklist(&mut out, report);

    out.push_str("## 三、审查结果\n\n");
    if report.provenance.is_degraded() {
        write_degraded_notice(&mut out, report);
    }
    write_risks(&mut out, &report.entries);
    write_comparison(&mut out, &report.entries);

    out.push_str("---\n\n## 免责声明\n\n");
    out.push_str(DISCLAIMER);
    out.push('\n');
    out
}

fn write_basic_info(out: &mut String, report: &ReviewReport, contract_name: &str) {
    let brief = &report.brief;
    let focus_points = if brief.focus_points.is_empty() {
        "无".to_string()
    } else {
        brief.focus_points.join("、")
    };

    out.push_str("## 一、基本信息\n\n");
    let _ = writeln!(out, "- **合同名称**: {contract_name}");
    let _ = writeln!(out, "- **客户身份**: {}", brief.identity.label());
    let _ = writeln!(out, "- **合同类型**: {}", brief.contract_type);
    let _ = writeln!(out, "- **关注要点**: {focus_points}");
    let _ = writeln!(
        out,
        "- **审查时间**: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "- **审查要点数量**: {}", report.checklist.len());
    let _ = writeln!(out, "- **文档摘要**: `{}`\n", short_digest(&report.document_digest));
}

fn write_checklist(out: &mut String, report: &ReviewReport) {
    out.push_str("## 二、审查要点清单\n\n### 审查维度\n\n");
    if report.focus_areas.is_empty() {
        out.push_str("- 通用条款\n");
    }
    for area in &report.focus_areas {
        let _ = writeln!(out, "- {area}");
    }

    out.push_str("\n### 具体审查点\n\n");
    for item in &report.checklist {
        if item.check_logic.is_empty() {
            let _ = writeln!(out, "- **{}**", item.topic);
        } else {
            let _ = writeln!(out, "- **{}**: {}", item.topic, item.check_logic);
        }
    }
    out.push('\n');
}

fn write_degraded_notice(out: &mut String, report: &ReviewReport) {
    let provenance = &report.provenance;
    let _ = writeln!(
        out,
        "> **注意**: {} 个分块中有 {} 个未能完成分析，以下条款未经审查：",
        provenance.total_chunks,
        provenance.failed_chunks.len()
    );
    for section in &provenance.unanalyzed_sections {
        let _ = writeln!(out, "> - §{} {}", section.index, section.title);
    }
    out.push('\n');
}

fn write_risks(out: &mut String, entries: &[ReportEntry]) {
    out.push_str("### 核心风险提示\n\n");
    if entries.is_empty() {
        out.push_str("未发现明显风险。\n\n");
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(out, "#### 风险点{}: {}", i + 1, entry.risk_summary);
        let _ = writeln!(out, "- **条款引用:** {}", clause_reference(entry));
        let _ = writeln!(out, "- **风险等级:** {}", entry.severity.label());
        let _ = writeln!(out, "- **风险分析:** {}\n", entry.rationale);
    }
}

fn write_comparison(out: &mut String, entries: &[ReportEntry]) {
    if entries.is_empty() {
        return;
    }

    out.push_str("### 修改方案对比\n\n");
    out.push_str("| 原条款内容 | 风险说明 | 修改建议 | 修改后建议文本 |\n");
    out.push_str("| :--- | :--- | :--- | :--- |\n");
    for entry in entries {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            table_cell(&entry.original_text),
            table_cell(&entry.risk_summary),
            table_cell(&entry.rationale),
            table_cell(&entry.suggested_text),
        );
    }
    out.push('\n');
}

fn clause_reference(entry: &ReportEntry) -> String {
    match (entry.section_ref, &entry.section_title) {
        (Some(index), Some(title)) => format!("§{index} {title}"),
        (Some(index), None) => format!("§{index}"),
        (None, _) => "全文".to_string(),
    }
}

/// Keep a cell on one table row.
fn table_cell(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "-".to_string();
    }
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

fn short_digest(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}
