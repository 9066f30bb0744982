//! Prompt Composer
//!
//! Pure functions rendering the two prompt templates. Identical inputs give
//! byte-identical output, which the response cache relies on. Each template
//! states the exact JSON shape the reply must have.

use crate::model::{ChecklistItem, Identity, ReviewBrief, Section};

/// System message sent with every call.
pub const SYSTEM_MESSAGE: &str = "你是一个专业的合同审查AI助手，专门帮助用户识别合同中的法律风险。
你的回答应该：
1. 专业准确：基于中国现行法律法规进行分析
2. 条理清晰：结构化地呈现问题和建议
3. 实用性强：提供具体可操作的修改建议
4. 保护利益：从客户角度出发，识别潜在风险
";

const NO_FOCUS_POINTS: &str = "无特别关注点，按合同类型进行全面审查";

const REFINEMENT_TEMPLATE: &str = "## Role: 资深法务专家
## Task: 审查需求转化
## Input:
1. 客户基本身份 (甲/乙方): {identity}
2. 合同类型: {contract_type}
3. 客户关注点: {focus_points}

## Workflow:
1. 分析客户身份及其核心利益诉求。
2. 针对该合同类型，列出5-8个必须审查的标准维度（如：主体资格、违约责任、争议管辖等）。
3. 将客户的\"关注点\"转化为具体的法律审查动作。

## Output Format (JSON):
请严格按照以下JSON格式输出，不要包含任何其他文字：
{
  \"contract_focus\": [\"维度1\", \"维度2\", \"维度3\"],
  \"specific_checks\": [
    {\"point\": \"具体审查点名称\", \"logic\": \"审查逻辑描述\"}
  ]
}
";

const REVIEW_TEMPLATE: &str = "## Role: 资深执业律师
## Profile: 你擅长识别合同陷阱，保护客户利益，语言专业严谨。

## Context:
- 客户身份: {identity}
- 审查重点清单:
{checklist}

## Goals:
- 严格依据中国现行法律（民法典等）进行合规性审查。
- 重点识别对客户不利的\"不平等条约\"。
- 提供可直接复制替换的修改建议条款。

## Workflows:
1. 逐条阅读下列合同条款，每个条款以 [§编号] 开头。
2. 对照审查清单逐条核对。
3. 每发现一个问题，输出一条 finding。

## 合同条款:
{sections}

## Output Format (JSON):
请严格按照以下JSON格式输出，不要包含任何其他文字：
{
  \"findings\": [
    {
      \"section_ref\": 0,
      \"risk_summary\": \"风险标题\",
      \"severity\": \"高\",
      \"original_text\": \"原条款内容\",
      \"suggested_text\": \"修改后建议的完整条款文本\",
      \"rationale\": \"风险分析：为什么不利，可能造成的后果，以及修改理由\"
    }
  ]
}
字段说明:
- section_ref: 问题所在条款的 § 编号（整数）；针对整份合同的问题填 null。只能使用上面出现过的编号。
- severity: 只能是 \"高\"、\"中\"、\"低\" 之一。
- 没有发现问题时输出 {\"findings\": []}。
";

/// Render one section the way the review prompt presents it.
#[must_use]
pub fn render_section(section: &Section) -> String {
    format!(
        "[§{}] {}\n{}",
        section.index,
        section.title,
        section.body.trim_end()
    )
}

/// Stage 1 prompt: turn the brief into review dimensions and a checklist.
#[must_use]
pub fn compose_refinement_prompt(brief: &ReviewBrief) -> String {
    let focus_points = if brief.focus_points.is_empty() {
        NO_FOCUS_POINTS.to_string()
    } else {
        brief.focus_points.join("；")
    };

    fill_template(
        REFINEMENT_TEMPLATE,
        &[
            ("identity", brief.identity.label()),
            ("contract_type", &brief.contract_type),
            ("focus_points", &focus_points),
        ],
    )
}

/// Stage 2 prompt: review `sections` against `checklist`.
#[must_use]
pub fn compose_review_prompt(
    identity: Identity,
    checklist: &[ChecklistItem],
    sections: &[Section],
) -> String {
    let checklist_text = checklist
        .iter()
        .map(|item| format!("- {}: {}", item.topic, item.check_logic))
        .collect::<Vec<_>>()
        .join("\n");

    let sections_text = sections
        .iter()
        .map(render_section)
        .collect::<Vec<_>>()
        .join("\n\n");

    fill_template(
        REVIEW_TEMPLATE,
        &[
            ("identity", identity.label()),
            ("checklist", &checklist_text),
            ("sections", &sections_text),
        ],
    )
}

/// Substitute `{name}` placeholders in one pass over `template`.
///
/// Inserted values are never rescanned, so user or model text that happens
/// to contain a placeholder stays literal. Unknown braces are copied as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let substituted = values.iter().find_map(|(name, value)| {
            tail.strip_prefix(*name)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (*value, after))
        });
        match substituted {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Correction appended to a prompt whose previous reply failed the schema check.
#[must_use]
pub fn compose_correction(reason: &str) -> String {
    format!(
        "\n\n## 格式纠正\n上一次回复无法按要求解析：{reason}\n请只输出符合上述 Output Format 的 JSON，不要包含任何解释、Markdown 标题或其他文字。\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> ReviewBrief {
        ReviewBrief::new(
            Identity::SecondParty,
            "买卖合同",
            vec!["付款周期".to_string(), "违约金".to_string()],
        )
    }

    fn sections() -> Vec<Section> {
        vec![
            Section {
                index: 0,
                title: "第一条 付款方式".to_string(),
                body: "第一条 付款方式\n乙方应在收货后90日内付款。\n\n".to_string(),
            },
            Section {
                index: 1,
                title: "第二条 违约责任".to_string(),
                body: "第二条 违约责任\n按{每日}千分之五计算。\n".to_string(),
            },
        ]
    }

    #[test]
    fn test_refinement_prompt_contains_brief() {
        let prompt = compose_refinement_prompt(&brief());
        assert!(prompt.contains("乙方"));
        assert!(prompt.contains("买卖合同"));
        assert!(prompt.contains("付款周期；违约金"));
        assert!(prompt.contains("\"specific_checks\""));
        assert!(!prompt.contains("{identity}"));
    }

    #[test]
    fn test_refinement_prompt_without_focus_points() {
        let brief = ReviewBrief::new(Identity::FirstParty, "租赁合同", Vec::new());
        assert!(compose_refinement_prompt(&brief).contains(NO_FOCUS_POINTS));
    }

    #[test]
    fn test_review_prompt_renders_sections_with_refs() {
        let checklist = vec![ChecklistItem::new("付款周期", "核查付款期限是否过长")];
        let prompt = compose_review_prompt(Identity::SecondParty, &checklist, &sections());

        assert!(prompt.contains("- 付款周期: 核查付款期限是否过长"));
        assert!(prompt.contains("[§0] 第一条 付款方式\n第一条 付款方式\n乙方应在收货后90日内付款。\n\n[§1]"));
        // Braces inside contract text survive untouched
        assert!(prompt.contains("按{每日}千分之五计算。"));
        assert!(prompt.contains("\"findings\""));
    }

    #[test]
    fn test_placeholders_in_values_stay_literal() {
        let brief = ReviewBrief::new(
            Identity::FirstParty,
            "软件{focus_points}合同",
            vec!["付款周期".to_string()],
        );
        let prompt = compose_refinement_prompt(&brief);
        assert!(prompt.contains("合同类型: 软件{focus_points}合同"));
        assert_eq!(prompt.matches("付款周期").count(), 1);

        let checklist = vec![ChecklistItem::new("{sections}", "{identity}")];
        let prompt = compose_review_prompt(Identity::SecondParty, &checklist, &sections());
        assert!(prompt.contains("- {sections}: {identity}"));
        assert_eq!(prompt.matches("[§0]").count(), 1);
    }

    #[test]
    fn test_fill_template_keeps_unknown_braces() {
        let filled = fill_template("{\"a\": {x}} {y} {", &[("x", "1")]);
        assert_eq!(filled, "{\"a\": 1} {y} {");
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let checklist = vec![ChecklistItem::new("违约金", "是否过高")];
        assert_eq!(
            compose_review_prompt(Identity::FirstParty, &checklist, &sections()),
            compose_review_prompt(Identity::FirstParty, &checklist, &sections())
        );
        assert_eq!(
            compose_refinement_prompt(&brief()),
            compose_refinement_prompt(&brief())
        );
    }

    #[test]
    fn test_correction_mentions_reason() {
        let correction = compose_correction("missing field `findings`");
        assert!(correction.contains("missing field `findings`"));
    }
}
