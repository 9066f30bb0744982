//! LLM Gateway
//!
//! The single point through which the engine talks to a model. Every call
//! carries the configured timeout and observes the run's cancellation token:
//! it is checked before the call starts, and a call still in flight when the
//! token fires is abandoned and its result discarded.

use clausecheck_llm::{LlmBackend, LlmError, LlmInvocation, LlmResult, Message};
use clausecheck_utils::error::{ReviewError, SchemaError};
use clausecheck_utils::logging::StageTimer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::extract::ParsedResponse;
use crate::model::Stage;
use crate::orchestrator::RunContext;
use crate::prompt::{SYSTEM_MESSAGE, compose_correction};
use crate::settings::ReviewSettings;

/// Number of correction retries after a reply fails the schema check.
pub const MAX_SCHEMA_RETRIES: u32 = 1;

/// A structured request: prompt, sampling temperature and a label for errors.
#[derive(Debug, Clone)]
pub struct StructuredRequest<'a> {
    pub stage: Stage,
    /// Names the request in errors and logs (`planning`, `chunk 2`)
    pub context: String,
    pub prompt: &'a str,
    pub temperature: f32,
}

#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
}

impl Gateway {
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, settings: &ReviewSettings) -> Self {
        Self {
            backend,
            model: settings.model.clone(),
            timeout: settings.call_timeout,
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.backend.provider_name()
    }

    /// Send `messages` and return the raw reply text.
    ///
    /// # Errors
    ///
    /// - `ReviewError::Cancelled` if the run was cancelled before or during the call
    /// - `ReviewError::Upstream` for backend failures, including the timeout
    pub async fn chat(
        &self,
        ctx: &RunContext,
        stage: Stage,
        messages: Vec<Message>,
        temperature: f32,
    ) -> Result<String, ReviewError> {
        self.call(ctx, stage, messages, temperature)
            .await
            .map(|result| result.raw_response)
    }

    async fn call(
        &self,
        ctx: &RunContext,
        stage: Stage,
        messages: Vec<Message>,
        temperature: f32,
    ) -> Result<LlmResult, ReviewError> {
        if ctx.is_cancelled() {
            return Err(ReviewError::Cancelled);
        }

        let invocation = LlmInvocation::new(
            ctx.run_id.as_str(),
            stage.as_str(),
            self.model.as_str(),
            self.timeout,
            messages,
        )
        .with_temperature(temperature);

        let timer = StageTimer::start();
        let call = tokio::time::timeout(self.timeout, self.backend.invoke(invocation));

        let outcome = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(ReviewError::Cancelled),
            outcome = call => outcome,
        };

        let result = match outcome {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(LlmError::Timeout {
                    duration: self.timeout,
                }
                .into());
            }
        };

        // A result that raced a cancellation is discarded
        if ctx.is_cancelled() {
            return Err(ReviewError::Cancelled);
        }

        debug!(
            run_id = %ctx.run_id,
            stage = %stage,
            provider = %result.provider,
            model = %result.model_used,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            duration_ms = timer.elapsed_ms() as u64,
            "Gateway call completed"
        );

        Ok(result)
    }

    /// Send a prompt whose reply must parse with `parse`.
    ///
    /// A malformed reply is retried `MAX_SCHEMA_RETRIES` times with a
    /// correction appended to the prompt, and handed back to the backend via
    /// [`LlmBackend::reject`]. Upstream errors are returned at once.
    ///
    /// # Errors
    ///
    /// - `ReviewError::Schema` once the retries are spent
    /// - Any error from [`Gateway::chat`]
    pub async fn chat_structured<T, F>(
        &self,
        ctx: &RunContext,
        request: StructuredRequest<'_>,
        parse: F,
    ) -> Result<T, ReviewError>
    where
        F: Fn(&str) -> ParsedResponse<T>,
    {
        let mut last_reason = String::new();
        let attempts = MAX_SCHEMA_RETRIES + 1;

        for attempt in 1..=attempts {
            let user_prompt = if attempt == 1 {
                request.prompt.to_string()
            } else {
                format!("{}{}", request.prompt, compose_correction(&last_reason))
            };
            let messages = vec![Message::system(SYSTEM_MESSAGE), Message::user(user_prompt)];

            let result = self
                .call(ctx, request.stage, messages, request.temperature)
                .await?;

            match parse(&result.raw_response) {
                ParsedResponse::Parsed(value) => return Ok(value),
                ParsedResponse::Malformed { raw, reason } => {
                    // Keep a stored copy from being replayed to later runs
                    self.backend.reject(&result);
                    warn!(
                        run_id = %ctx.run_id,
                        stage = %request.stage,
                        context = %request.context,
                        attempt = attempt,
                        reason = %reason,
                        response_chars = raw.chars().count(),
                        "Model reply failed the schema check"
                    );
                    last_reason = reason;
                }
            }
        }

        Err(SchemaError::RetriesExhausted {
            context: request.context,
            attempts,
            reason: last_reason,
        }
        .into())
    }
}
