//! Review Analyzer (stage 2): sections + checklist -> findings.
//!
//! Sections are batched into chunks whose full review prompt (template,
//! identity and checklist included) respects a character budget. Chunks
//! split only on section boundaries. Chunks are reviewed concurrently, up to
//! `max_concurrency` at a time, and each writes into its own slot. Slots are
//! folded in chunk order once every task has reported, so the output never
//! depends on completion order.
//!
//! A failed chunk does not abort its siblings. The run degrades instead, and
//! only fails when every chunk failed.

use clausecheck_utils::error::ReviewError;
use serde_json::Value;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::extract::{ParsedResponse, array_field, extract_json, string_field};
use crate::gateway::{Gateway, StructuredRequest};
use crate::model::{
    ChecklistItem, Finding, Identity, Provenance, RunOutcome, Section, Severity, Stage,
    UnanalyzedSection,
};
use crate::orchestrator::RunContext;
use crate::prompt::{compose_review_prompt, render_section};

/// Separator between rendered sections inside a prompt.
const SECTION_SEPARATOR_CHARS: usize = 2;

const RISK_KEYS: &[&str] = &["risk_summary", "risk", "title"];
const SEVERITY_KEYS: &[&str] = &["severity", "risk_level", "level"];
const ORIGINAL_KEYS: &[&str] = &["original_text", "original"];
const SUGGESTED_KEYS: &[&str] = &["suggested_text", "revised_text", "suggestion"];
const RATIONALE_KEYS: &[&str] = &["rationale", "analysis", "reason"];

/// A contiguous run of sections reviewed in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub sections: Range<usize>,
}

/// Greedily pack sections into chunks whose prompt stays within `budget_chars`.
///
/// `overhead_chars` is the size of the prompt without any sections. A section
/// that does not fit next to the overhead on its own gets a chunk of its own.
#[must_use]
pub fn plan_chunks(sections: &[Section], budget_chars: usize, overhead_chars: usize) -> Vec<Chunk> {
    let section_budget = budget_chars.saturating_sub(overhead_chars);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut used = 0;

    for (i, section) in sections.iter().enumerate() {
        let size = render_section(section).chars().count() + SECTION_SEPARATOR_CHARS;
        if i > start && used + size > section_budget {
            chunks.push(Chunk {
                index: chunks.len(),
                sections: start..i,
            });
            start = i;
            used = 0;
        }
        used += size;
    }

    if start < sections.len() {
        chunks.push(Chunk {
            index: chunks.len(),
            sections: start..sections.len(),
        });
    }
    chunks
}

/// Per-chunk slot: `Pending -> Sent -> {Parsed | Failed}`.
///
/// A slot is `Pending` while the chunk is only planned and becomes `Sent` when
/// its task is spawned, which may be before it holds a concurrency permit.
/// A slot still `Pending` or `Sent` at fold time never reported a result.
#[derive(Debug)]
pub enum ChunkState {
    /// Planned, no task spawned yet
    Pending,
    /// Task spawned; waiting for a permit or in its gateway call
    Sent,
    Parsed(Vec<Finding>),
    Failed(ReviewError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub sections: Range<usize>,
    pub reason: String,
}

/// Union of parsed findings plus the chunks that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub findings: Vec<Finding>,
    pub total_chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl AnalysisOutcome {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.failed_chunks.is_empty()
    }

    /// Report provenance for this outcome.
    #[must_use]
    pub fn provenance(&self, sections: &[Section]) -> Provenance {
        if !self.is_degraded() {
            return Provenance::complete(self.total_chunks);
        }
        let unanalyzed_sections = self
            .failed_chunks
            .iter()
            .flat_map(|failure| failure.sections.clone())
            .filter_map(|index| sections.get(index))
            .map(|section| UnanalyzedSection {
                index: section.index,
                title: section.title.clone(),
            })
            .collect();

        Provenance {
            outcome: RunOutcome::Degraded,
            total_chunks: self.total_chunks,
            failed_chunks: self.failed_chunks.iter().map(|f| f.chunk_index).collect(),
            unanalyzed_sections,
        }
    }
}

/// Read a review reply into findings for the sections in `allowed`.
///
/// A `section_ref` outside `allowed` makes the reply malformed: the model
/// can only cite sections it was shown.
pub fn parse_findings(raw: &str, allowed: &Range<usize>) -> ParsedResponse<Vec<Finding>> {
    let value = match extract_json(raw) {
        Ok((value, _)) => value,
        Err(reason) => return ParsedResponse::malformed(raw, reason),
    };

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(_) => match array_field(&value, &["findings"]) {
            Some(items) => items,
            None => return ParsedResponse::malformed(raw, "expected a `findings` array"),
        },
        _ => return ParsedResponse::malformed(raw, "expected a JSON object or array"),
    };

    let mut findings = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match parse_finding(item, allowed) {
            Ok(finding) => findings.push(finding),
            Err(reason) => return ParsedResponse::malformed(raw, format!("finding {i}: {reason}")),
        }
    }
    ParsedResponse::Parsed(findings)
}

fn parse_finding(item: &Value, allowed: &Range<usize>) -> Result<Finding, String> {
    let risk_summary = string_field(item, RISK_KEYS).ok_or("missing `risk_summary`")?;

    let severity_text = string_field(item, SEVERITY_KEYS).ok_or("missing `severity`")?;
    let severity = Severity::parse_lenient(&severity_text)
        .ok_or_else(|| format!("unknown severity '{severity_text}'"))?;

    let section_ref = parse_section_ref(item.get("section_ref"))?;
    if let Some(index) = section_ref
        && !allowed.contains(&index)
    {
        return Err(format!(
            "section_ref {index} is not one of the sections in this request (§{}-§{})",
            allowed.start,
            allowed.end.saturating_sub(1)
        ));
    }

    Ok(Finding {
        section_ref,
        risk_summary,
        original_text: string_field(item, ORIGINAL_KEYS).unwrap_or_default(),
        suggested_text: string_field(item, SUGGESTED_KEYS).unwrap_or_default(),
        rationale: string_field(item, RATIONALE_KEYS).unwrap_or_default(),
        severity,
    })
}

fn parse_section_ref(value: Option<&Value>) -> Result<Option<usize>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) if i < 0 => Ok(None),
            Some(i) => usize::try_from(i)
                .map(Some)
                .map_err(|_| format!("section_ref {i} is out of range")),
            None => Err(format!("section_ref {n} is not an integer")),
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim().trim_start_matches('§').trim();
            match trimmed {
                "" | "null" | "none" | "全文" | "global" => Ok(None),
                digits => digits
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| format!("section_ref '{s}' is not a section number")),
            }
        }
        Some(other) => Err(format!("section_ref has unexpected type: {other}")),
    }
}

pub struct Analyzer {
    gateway: Arc<Gateway>,
    max_concurrency: usize,
    chunk_budget_chars: usize,
    temperature: f32,
}

impl Analyzer {
    #[must_use]
    pub fn new(
        gateway: Arc<Gateway>,
        max_concurrency: usize,
        chunk_budget_chars: usize,
        temperature: f32,
    ) -> Self {
        Self {
            gateway,
            max_concurrency: max_concurrency.max(1),
            chunk_budget_chars,
            temperature,
        }
    }

    /// Chunks for `sections`, budgeting for the prompt around them.
    #[must_use]
    pub fn plan(
        &self,
        identity: Identity,
        checklist: &[ChecklistItem],
        sections: &[Section],
    ) -> Vec<Chunk> {
        let overhead = compose_review_prompt(identity, checklist, &[]).chars().count();
        if overhead >= self.chunk_budget_chars {
            warn!(
                overhead_chars = overhead,
                budget_chars = self.chunk_budget_chars,
                "Review prompt leaves no room for contract text, reviewing one section per call"
            );
        }
        plan_chunks(sections, self.chunk_budget_chars, overhead)
    }

    /// Review `sections` against `checklist`.
    ///
    /// # Errors
    ///
    /// - `ReviewError::Cancelled` when the run was cancelled; partial results are discarded
    /// - The first chunk's error when every chunk failed
    pub async fn analyze(
        &self,
        ctx: &RunContext,
        identity: Identity,
        sections: &[Section],
        checklist: &[ChecklistItem],
    ) -> Result<AnalysisOutcome, ReviewError> {
        let chunks = self.plan(identity, checklist, sections);
        let total_chunks = chunks.len();
        let shared_sections: Arc<[Section]> = Arc::from(sections);
        let shared_checklist: Arc<[ChecklistItem]> = Arc::from(checklist);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        info!(
            run_id = %ctx.run_id,
            sections = sections.len(),
            chunks = total_chunks,
            max_concurrency = self.max_concurrency,
            "Starting chunked analysis"
        );

        let mut states: Vec<ChunkState> = chunks.iter().map(|_| ChunkState::Pending).collect();
        let mut tasks = JoinSet::new();

        for chunk in &chunks {
            let gateway = Arc::clone(&self.gateway);
            let ctx = ctx.clone();
            let sections = Arc::clone(&shared_sections);
            let checklist = Arc::clone(&shared_checklist);
            let semaphore = Arc::clone(&semaphore);
            let index = chunk.index;
            let chunk = chunk.clone();
            let temperature = self.temperature;

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (chunk.index, Err(ReviewError::Cancelled));
                };
                if ctx.is_cancelled() {
                    return (chunk.index, Err(ReviewError::Cancelled));
                }

                debug!(run_id = %ctx.run_id, chunk = chunk.index, sections = ?chunk.sections, "Chunk started");
                let prompt =
                    compose_review_prompt(identity, &checklist, &sections[chunk.sections.clone()]);
                let allowed = chunk.sections.clone();
                let request = StructuredRequest {
                    stage: Stage::Analyzing,
                    context: format!("chunk {}", chunk.index),
                    prompt: &prompt,
                    temperature,
                };
                let result = gateway
                    .chat_structured(&ctx, request, |raw| parse_findings(raw, &allowed))
                    .await;
                (chunk.index, result)
            });
            states[index] = ChunkState::Sent;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(findings))) => {
                    debug!(run_id = %ctx.run_id, chunk = index, findings = findings.len(), "Chunk parsed");
                    states[index] = ChunkState::Parsed(findings);
                }
                Ok((index, Err(err))) => {
                    if !matches!(err, ReviewError::Cancelled) {
                        warn!(run_id = %ctx.run_id, chunk = index, error = %err, "Chunk failed");
                    }
                    states[index] = ChunkState::Failed(err);
                }
                // The slot stays `Sent` and is reported by the fold below
                Err(join_error) => {
                    warn!(run_id = %ctx.run_id, error = %join_error, "Chunk task did not complete");
                }
            }
        }

        if ctx.is_cancelled() {
            info!(run_id = %ctx.run_id, "Analysis cancelled, discarding chunk results");
            return Err(ReviewError::Cancelled);
        }

        fold_chunks(&chunks, states)
    }
}

fn fold_chunks(chunks: &[Chunk], states: Vec<ChunkState>) -> Result<AnalysisOutcome, ReviewError> {
    let mut findings = Vec::new();
    let mut failed_chunks = Vec::new();
    let mut first_error = None;

    for (chunk, state) in chunks.iter().zip(states) {
        let error = match state {
            ChunkState::Parsed(parsed) => {
                findings.extend(parsed);
                continue;
            }
            ChunkState::Failed(err) => err,
            ChunkState::Pending | ChunkState::Sent => {
                ReviewError::Internal(format!("chunk {} never reported a result", chunk.index))
            }
        };
        failed_chunks.push(ChunkFailure {
            chunk_index: chunk.index,
            sections: chunk.sections.clone(),
            reason: error.to_string(),
        });
        first_error.get_or_insert(error);
    }

    if !chunks.is_empty()
        && failed_chunks.len() == chunks.len()
        && let Some(error) = first_error
    {
        return Err(error);
    }

    // Stable: chunk order is kept within a section, document-wide findings go last
    findings.sort_by_key(|f| (f.section_ref.is_none(), f.section_ref));

    Ok(AnalysisOutcome {
        findings,
        total_chunks: chunks.len(),
        failed_chunks,
    })
}
