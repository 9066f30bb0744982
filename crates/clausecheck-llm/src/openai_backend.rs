//! OpenAI-compatible HTTP backend
//!
//! Talks to any server exposing `POST {base_url}/chat/completions`: OpenAI,
//! DeepSeek, vLLM, LM Studio and similar.

use crate::LlmError;
use crate::http_client::{HttpClient, join_url};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message};
use async_trait::async_trait;
use clausecheck_config::{
    Config, DEFAULT_OPENAI_API_KEY_ENV, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "openai";

/// Temperature used when neither the config nor the stage sets one
const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default completion size
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// OpenAI-compatible backend
#[derive(Clone)]
pub(crate) struct OpenAiBackend {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
    /// Fixed temperature from config; overrides the stage temperature
    temperature_override: Option<f32>,
}

impl OpenAiBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
        max_tokens: Option<u32>,
        temperature_override: Option<f32>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        Ok(Self {
            client: HttpClient::new()?,
            endpoint: join_url(&base_url, "chat/completions"),
            api_key,
            default_model,
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature_override,
        })
    }

    /// Create a new backend from configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if:
    /// - The API key environment variable is not set
    /// - The HTTP client cannot be constructed
    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let section = config.llm.openai.clone().unwrap_or_default();

        let api_key_env = section
            .api_key_env
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_API_KEY_ENV);

        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                LlmError::Misconfiguration(format!(
                    "API key not found in environment variable '{}'. \
                     Set this variable or configure a different api_key_env in [llm.openai].",
                    api_key_env
                ))
            })?;

        let default_model = if config.provider() == PROVIDER {
            config.effective_model()
        } else {
            section
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string())
        };

        Self::new(
            api_key,
            section.base_url,
            default_model,
            section.max_tokens,
            section.temperature,
        )
    }

    fn build_request(&self, inv: &LlmInvocation) -> ChatRequest {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };

        let max_tokens = inv
            .metadata
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(self.max_tokens);

        let temperature = self
            .temperature_override
            .or(inv.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);

        ChatRequest {
            model,
            messages: convert_messages(&inv.messages),
            max_tokens,
            temperature,
            stream: false,
        }
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

fn into_result(body: ChatResponse, model: String) -> Result<LlmResult, LlmError> {
    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Transport("openai response missing choices[0]".to_string()))?;

    let content = choice.message.content.ok_or_else(|| {
        LlmError::Transport("openai response missing content in choices[0]".to_string())
    })?;

    let mut result = LlmResult::new(content, PROVIDER, body.model.unwrap_or(model));
    if let Some(usage) = body.usage {
        result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
    }
    Ok(result)
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let body = self.build_request(&inv);
        let model = body.model.clone();

        debug!(
            provider = PROVIDER,
            run_id = %inv.run_id,
            stage = %inv.stage,
            model = %model,
            max_tokens = body.max_tokens,
            temperature = body.temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking OpenAI-compatible backend"
        );

        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, PROVIDER)
            .await?;

        let response_body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse openai response: {}", e))
        })?;

        let result = into_result(response_body, model)?;

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "OpenAI-compatible invocation completed"
        );

        Ok(result)
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
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend(temperature_override: Option<f32>) -> OpenAiBackend {
        OpenAiBackend::new(
            "sk-test".to_string(),
            Some("https://api.deepseek.com/v1/".to_string()),
            "deepseek-chat".to_string(),
            None,
            temperature_override,
        )
        .unwrap()
    }

    fn invocation(model: &str) -> LlmInvocation {
        LlmInvocation::new(
            "run-1",
            "analyzing",
            model,
            Duration::from_secs(30),
            vec![Message::system("你是专业律师"), Message::user("审查合同")],
        )
    }

    #[test]
    fn test_endpoint_is_joined() {
        assert_eq!(
            backend(None).endpoint,
            "https://api.deepseek.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_uses_stage_temperature_and_default_model() {
        let request = backend(None).build_request(&invocation("").with_temperature(0.5));
        assert_eq!(request.model, "deepseek-chat");
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!request.stream);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "审查合同");
    }

    #[test]
    fn test_config_temperature_overrides_stage() {
        let request = backend(Some(0.0)).build_request(&invocation("gpt-4").with_temperature(0.5));
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn test_metadata_max_tokens() {
        let inv = invocation("").with_metadata("max_tokens", serde_json::json!(256));
        assert_eq!(backend(None).build_request(&inv).max_tokens, 256);
    }

    #[test]
    fn test_into_result_reads_first_choice_and_usage() {
        let body: ChatResponse = serde_json::from_value(serde_json::json!({
            "model": "deepseek-chat",
            "choices": [{"message": {"role": "assistant", "content": "{\"findings\":[]}"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }))
        .unwrap();

        let result = into_result(body, "fallback".to_string()).unwrap();
        assert_eq!(result.raw_response, "{\"findings\":[]}");
        assert_eq!(result.model_used, "deepseek-chat");
        assert_eq!(result.tokens_input, Some(12));
        assert_eq!(result.provider, "openai");
    }

    #[test]
    fn test_into_result_without_choices_is_transport_error() {
        let body: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            into_result(body, "m".to_string()),
            Err(LlmError::Transport(_))
        ));
    }
}
