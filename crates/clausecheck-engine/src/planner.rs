//! Review Planner (stage 1): brief -> checklist.

use clausecheck_utils::error::ReviewError;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::extract::{ParsedResponse, array_field, extract_json, string_field};
use crate::gateway::{Gateway, StructuredRequest};
use crate::model::{Checklist, ChecklistItem, ReviewBrief, Stage};
use crate::orchestrator::RunContext;
use crate::prompt::compose_refinement_prompt;

const ITEM_LIST_KEYS: &[&str] = &["checklist", "specific_checks", "items"];
const TOPIC_KEYS: &[&str] = &["topic", "point"];
const LOGIC_KEYS: &[&str] = &["check_logic", "logic"];
const FOCUS_KEYS: &[&str] = &["contract_focus", "focus_areas"];

/// Compliance and risk items used when the planner is skipped.
pub fn preset_checklist(brief: &ReviewBrief) -> Checklist {
    let mut items = vec![
        ChecklistItem::new("合规性审查", "检查条款是否符合法律法规"),
        ChecklistItem::new("风险识别", "识别对客户不利的条款"),
    ];
    items.extend(brief.focus_points.iter().map(|point| {
        ChecklistItem::new(point.as_str(), format!("重点审查与“{point}”相关的条款"))
    }));

    let focus_areas = if brief.focus_points.is_empty() {
        vec!["通用条款".to_string(), "核心条款".to_string()]
    } else {
        brief.focus_points.clone()
    };

    Checklist { focus_areas, items }
}

/// Read a refinement reply into a checklist.
///
/// Accepts a bare array of items or an object carrying the items under
/// `checklist` / `specific_checks`. Items name their topic `topic` or `point`
/// and their logic `check_logic` or `logic`.
pub fn parse_checklist(raw: &str) -> ParsedResponse<Checklist> {
    let value = match extract_json(raw) {
        Ok((value, _)) => value,
        Err(reason) => return ParsedResponse::malformed(raw, reason),
    };

    let (items_value, focus_areas) = match &value {
        Value::Array(items) => (items, Vec::new()),
        Value::Object(_) => {
            let Some(items) = array_field(&value, ITEM_LIST_KEYS) else {
                return ParsedResponse::malformed(
                    raw,
                    "expected a `specific_checks` array in the reply",
                );
            };
            let focus: Vec<String> = array_field(&value, FOCUS_KEYS)
                .map(|areas| {
                    areas
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            (items, focus)
        }
        _ => return ParsedResponse::malformed(raw, "expected a JSON object or array"),
    };

    let mut items = Vec::with_capacity(items_value.len());
    for (i, item) in items_value.iter().enumerate() {
        let Some(topic) = string_field(item, TOPIC_KEYS) else {
            return ParsedResponse::malformed(raw, format!("checklist item {i} has no `point`"));
        };
        let check_logic = string_field(item, LOGIC_KEYS).unwrap_or_default();
        items.push(ChecklistItem { topic, check_logic });
    }

    if items.is_empty() {
        return ParsedResponse::malformed(raw, "checklist is empty");
    }

    ParsedResponse::Parsed(Checklist { focus_areas, items })
}

pub struct Planner {
    gateway: Arc<Gateway>,
    temperature: f32,
}

impl Planner {
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, temperature: f32) -> Self {
        Self {
            gateway,
            temperature,
        }
    }

    /// Derive the review checklist from `brief`.
    ///
    /// # Errors
    ///
    /// - `ReviewError::Schema` when the reply is still malformed after the retry
    /// - `ReviewError::Upstream` when the gateway fails
    /// - `ReviewError::Cancelled` when the run is cancelled
    pub async fn plan(&self, ctx: &RunContext, brief: &ReviewBrief) -> Result<Checklist, ReviewError> {
        let prompt = compose_refinement_prompt(brief);
        let request = StructuredRequest {
            stage: Stage::Planning,
            context: "planning".to_string(),
            prompt: &prompt,
            temperature: self.temperature,
        };

        let checklist = self
            .gateway
            .chat_structured(ctx, request, parse_checklist)
            .await?;

        info!(
            run_id = %ctx.run_id,
            items = checklist.items.len(),
            focus_areas = checklist.focus_areas.len(),
            "Checklist generated"
        );
        Ok(checklist)
    }
}
