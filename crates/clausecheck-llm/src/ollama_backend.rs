//! Local Ollama backend (`POST {base_url}/api/chat`, non-streaming)

use crate::LlmError;
use crate::http_client::{HttpClient, join_url};
use crate::types::{LlmBackend, LlmInvocation, LlmResult};
use async_trait::async_trait;
use clausecheck_config::{Config, DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "ollama";

const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Clone)]
pub(crate) struct OllamaBackend {
    client: HttpClient,
    endpoint: String,
    default_model: String,
    temperature_override: Option<f32>,
}

impl OllamaBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        base_url: Option<String>,
        default_model: String,
        temperature_override: Option<f32>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string());
        Ok(Self {
            client: HttpClient::new()?,
            endpoint: join_url(&base_url, "api/chat"),
            default_model,
            temperature_override,
        })
    }

    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.ollama.clone().unwrap_or_default();
        let default_model = if config.provider() == PROVIDER {
            config.effective_model()
        } else {
            section
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string())
        };
        Self::new(section.base_url, default_model, section.temperature)
    }

    fn build_request(&self, inv: &LlmInvocation) -> ChatRequest {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        let temperature = self
            .temperature_override
            .or(inv.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);

        ChatRequest {
            model,
            messages: inv
                .messages
                .iter()
                .map(|msg| ChatMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
            stream: false,
            options: ChatOptions { temperature },
        }
    }
}

fn into_result(body: ChatResponse, model: String) -> Result<LlmResult, LlmError> {
    let content = body
        .message
        .map(|m| m.content)
        .ok_or_else(|| LlmError::Transport("ollama response missing message".to_string()))?;

    let mut result = LlmResult::new(content, PROVIDER, body.model.unwrap_or(model));
    if let (Some(input), Some(output)) = (body.prompt_eval_count, body.eval_count) {
        result = result.with_tokens(input, output);
    }
    Ok(result)
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let body = self.build_request(&inv);
        let model = body.model.clone();

        debug!(
            provider = PROVIDER,
            run_id = %inv.run_id,
            stage = %inv.stage,
            model = %model,
            temperature = body.options.temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Ollama backend"
        );

        let request = self.client.post(&self.endpoint).json(&body);
        let response = self
            .client
            .execute_with_retry(request, inv.timeout, PROVIDER)
            .await?;

        let response_body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse ollama response: {}", e))
        })?;

        into_result(response_body, model)
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    message: Option<ResponseMessage>,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: String,
}
