//! Data model shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An addressable unit of the contract.
///
/// `body` is the verbatim text of the section, heading line included, so the
/// bodies of all sections concatenate back to the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub index: usize,
    pub title: String,
    pub body: String,
}

/// Which side of the contract the client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    FirstParty,
    SecondParty,
}

impl Identity {
    /// Label used in prompts and reports (`甲方` / `乙方`).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::FirstParty => "甲方",
            Self::SecondParty => "乙方",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first_party" | "first-party" | "party-a" | "a" | "甲方" | "甲" => {
                Ok(Self::FirstParty)
            }
            "second" | "second_party" | "second-party" | "party-b" | "b" | "乙方" | "乙" => {
                Ok(Self::SecondParty)
            }
            other => Err(format!(
                "unknown identity '{other}', expected 'first' (甲方) or 'second' (乙方)"
            )),
        }
    }
}

/// What the client wants reviewed. Fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewBrief {
    pub identity: Identity,
    pub contract_type: String,
    pub focus_points: Vec<String>,
}

impl ReviewBrief {
    #[must_use]
    pub fn new(
        identity: Identity,
        contract_type: impl Into<String>,
        focus_points: Vec<String>,
    ) -> Self {
        Self {
            identity,
            contract_type: contract_type.into(),
            focus_points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub topic: String,
    pub check_logic: String,
}

impl ChecklistItem {
    #[must_use]
    pub fn new(topic: impl Into<String>, check_logic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            check_logic: check_logic.into(),
        }
    }
}

/// Planner output: review dimensions plus the ordered, non-empty checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub focus_areas: Vec<String>,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "低",
            Self::Medium => "中",
            Self::High => "高",
        }
    }

    /// Parse the severity spellings models actually produce.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" | "高" | "高风险" | "严重" => Some(Self::High),
            "medium" | "mid" | "moderate" | "中" | "中风险" | "中等" => Some(Self::Medium),
            "low" | "低" | "低风险" | "轻微" => Some(Self::Low),
            _ => None,
        }
    }
}

/// One reviewed risk. `section_ref: None` marks a document-wide finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub section_ref: Option<usize>,
    pub risk_summary: String,
    pub original_text: String,
    pub suggested_text: String,
    pub rationale: String,
    pub severity: Severity,
}

/// A row of the comparison table, with the verbatim section text attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub section_ref: Option<usize>,
    pub section_title: Option<String>,
    pub risk_summary: String,
    pub severity: Severity,
    /// Verbatim section body when `section_ref` resolves, else the model's quote
    pub original_text: String,
    pub suggested_text: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Complete,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnanalyzedSection {
    pub index: usize,
    pub title: String,
}

/// How much of the document the findings actually cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub outcome: RunOutcome,
    pub total_chunks: usize,
    /// 0-based indices of chunks whose analysis failed
    pub failed_chunks: Vec<usize>,
    pub unanalyzed_sections: Vec<UnanalyzedSection>,
}

impl Provenance {
    /// Provenance of a run where every chunk was analyzed.
    #[must_use]
    pub fn complete(total_chunks: usize) -> Self {
        Self {
            outcome: RunOutcome::Complete,
            total_chunks,
            failed_chunks: Vec::new(),
            unanalyzed_sections: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.outcome == RunOutcome::Degraded
    }
}

/// The assembled review. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub brief: ReviewBrief,
    pub focus_areas: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
    pub findings: Vec<Finding>,
    pub entries: Vec<ReportEntry>,
    pub provenance: Provenance,
    /// blake3 of the source document
    pub document_digest: String,
    pub generated_at: DateTime<Utc>,
}

/// Pipeline stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structuring,
    Planning,
    Analyzing,
    Assembling,
    Done,
    Failed,
}

impl Stage {
    /// Number of reported steps in a run.
    pub const STEPS: u8 = 5;

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structuring => "structuring",
            Self::Planning => "planning",
            Self::Analyzing => "analyzing",
            Self::Assembling => "assembling",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// 1-based step number for progress output; `Failed` has none.
    #[must_use]
    pub fn step(self) -> Option<u8> {
        match self {
            Self::Structuring => Some(1),
            Self::Planning => Some(2),
            Self::Analyzing => Some(3),
            Self::Assembling => Some(4),
            Self::Done => Some(5),
            Self::Failed => None,
        }
    }

    /// The stage that follows this one on the success path.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Structuring => Some(Self::Planning),
            Self::Planning => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Assembling),
            Self::Assembling => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
