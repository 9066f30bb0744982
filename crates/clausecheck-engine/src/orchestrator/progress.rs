use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Stage;

/// A stage transition notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for ProgressEvent {
    /// `[n/5] message`, or `[failed] message` for the failure event.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage.step() {
            Some(step) => write!(f, "[{}/{}] {}", step, Stage::STEPS, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

pub(crate) const MSG_STRUCTURING: &str = "正在解析合同文档...";
pub(crate) const MSG_PLANNING: &str = "AI正在分析需求，生成审查清单...";
pub(crate) const MSG_PLANNING_PRESET: &str = "使用预设审查清单（快速审查）";
pub(crate) const MSG_ASSEMBLING: &str = "正在生成审查报告...";
pub(crate) const MSG_DONE: &str = "审查完成！";
pub(crate) const MSG_DONE_DEGRADED: &str = "审查完成（部分条款未能分析）";

pub(crate) fn analyzing_message(sections: usize, chunks: usize) -> String {
    format!("AI正在深度审查合同条款（{sections} 个条款，{chunks} 个分块）...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_numbers_steps() {
        let event = ProgressEvent {
            stage: Stage::Analyzing,
            message: analyzing_message(4, 2),
        };
        assert_eq!(
            event.to_string(),
            "[3/5] AI正在深度审查合同条款（4 个条款，2 个分块）..."
        );

        let failed = ProgressEvent {
            stage: Stage::Failed,
            message: "planning: timeout".to_string(),
        };
        assert_eq!(failed.to_string(), "[failed] planning: timeout");
    }
}
