//! Shared fixtures for the integration tests: a scripted LLM backend and
//! sample contracts.

#![allow(dead_code)]

use async_trait::async_trait;
use clausecheck::engine::{CancellationToken, Identity, ReviewBrief, ReviewSettings};
use clausecheck::llm::{LlmBackend, LlmError, LlmInvocation, LlmResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub const PURCHASE_CONTRACT: &str = "第一条 付款方式\n甲方应在收货后180日内向乙方付款。\n\n第二条 违约责任\n乙方逾期交货的，每日按合同总额的5%支付违约金。\n\n第三条 争议解决\n双方协商不成的，提交甲方所在地法院诉讼解决。\n";

pub const PAYMENT_PLAN: &str = r#"```json
{"contract_focus": ["付款条款", "违约责任"],
 "specific_checks": [
   {"point": "付款周期", "logic": "付款期限是否明确且合理，是否超过行业惯例"},
   {"point": "违约金比例", "logic": "违约金是否过高或过低"}
 ]}
```"#;

/// Review replies are built by this function from the section refs shown in
/// the prompt.
pub type Responder = Box<dyn Fn(&[usize]) -> Result<String, LlmError> + Send + Sync>;

/// A backend that answers planning calls from a queue and review calls from
/// a responder, with optional per-call delay and cancellation.
pub struct ScriptedBackend {
    planning_replies: Mutex<VecDeque<String>>,
    responder: Responder,
    review_delay: Box<dyn Fn(&[usize]) -> Duration + Send + Sync>,
    cancel_on_review: Option<CancellationToken>,
    pub planning_calls: AtomicU32,
    pub review_calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(planning_replies: Vec<&str>) -> Self {
        Self {
            planning_replies: Mutex::new(planning_replies.into_iter().map(String::from).collect()),
            responder: Box::new(|refs| Ok(one_finding_per_section(refs))),
            review_delay: Box::new(|_| Duration::ZERO),
            cancel_on_review: None,
            planning_calls: AtomicU32::new(0),
            review_calls: AtomicU32::new(0),
        }
    }

    pub fn with_responder(
        mut self,
        responder: impl Fn(&[usize]) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    pub fn with_review_delay(
        mut self,
        delay: impl Fn(&[usize]) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.review_delay = Box::new(delay);
        self
    }

    /// Cancel `token` as soon as the first review call arrives, then stall.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_review = Some(token);
        self
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        if inv.stage == "planning" {
            self.planning_calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .planning_replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| PAYMENT_PLAN.to_string());
            return Ok(LlmResult::new(reply, "scripted", inv.model));
        }

        self.review_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = &inv.messages.last().expect("user message").content;
        let refs = section_refs(prompt);

        if let Some(token) = &self.cancel_on_review {
            token.cancel();
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        let delay = (self.review_delay)(&refs);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let reply = (self.responder)(&refs)?;
        Ok(LlmResult::new(reply, "scripted", inv.model))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Shares a [`ScriptedBackend`] with a wrapping backend while the test keeps
/// reading its counters.
pub struct Shared(pub Arc<ScriptedBackend>);

#[async_trait]
impl LlmBackend for Shared {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.0.invoke(inv).await
    }

    fn provider_name(&self) -> &str {
        self.0.provider_name()
    }
}

/// Section numbers of the `[§N]` markers that open a line in `prompt`.
pub fn section_refs(prompt: &str) -> Vec<usize> {
    prompt
        .lines()
        .filter_map(|line| line.strip_prefix("[§"))
        .filter_map(|rest| {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .collect()
}

/// One medium finding per section shown.
pub fn one_finding_per_section(refs: &[usize]) -> String {
    let findings: Vec<String> = refs
        .iter()
        .map(|n| {
            format!(
                r#"{{"section_ref": {n}, "risk_summary": "§{n} 条款风险", "severity": "中", "original_text": "原文", "suggested_text": "§{n} 修改后文本", "rationale": "理由{n}"}}"#
            )
        })
        .collect();
    format!(r#"{{"findings": [{}]}}"#, findings.join(","))
}

pub fn purchase_brief() -> ReviewBrief {
    ReviewBrief::new(
        Identity::FirstParty,
        "采购合同",
        vec!["付款周期".to_string(), "违约责任".to_string()],
    )
}

/// Settings that put every section in its own chunk.
pub fn one_section_per_chunk(max_concurrency: usize) -> ReviewSettings {
    ReviewSettings {
        max_concurrency,
        chunk_budget_chars: 1,
        call_timeout: Duration::from_secs(5),
        ..ReviewSettings::default()
    }
}
