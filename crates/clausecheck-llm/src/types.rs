//! Core types for LLM backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message (plain UTF-8 text)
    pub content: String,
}

impl Message {
    /// Create a new message
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Input to an LLM backend invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// Run identifier, for log correlation
    pub run_id: String,
    /// Pipeline stage issuing the call (`planning`, `analyzing`)
    pub stage: String,
    /// Model to use for this invocation; empty means the backend default
    pub model: String,
    /// Timeout for this invocation
    pub timeout: Duration,
    /// Sampling temperature requested by the stage
    pub temperature: Option<f32>,
    /// Ordered list of messages in the conversation
    pub messages: Vec<Message>,
    /// Provider-specific metadata (e.g., max_tokens)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    /// Create a new LLM invocation
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        stage: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            stage: stage.into(),
            model: model.into(),
            timeout,
            temperature: None,
            messages,
            metadata: HashMap::new(),
        }
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Add metadata to the invocation
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Result from an LLM backend invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text from the LLM
    pub raw_response: String,
    /// Provider name (e.g., "openai", "ollama")
    pub provider: String,
    /// Model that was actually used
    pub model_used: String,
    /// Input tokens consumed (if available)
    pub tokens_input: Option<u64>,
    /// Output tokens generated (if available)
    pub tokens_output: Option<u64>,
    /// Provider-specific extensions
    #[serde(default)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl LlmResult {
    /// Create a new LLM result
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
            extensions: HashMap::new(),
        }
    }

    /// Set token counts
    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }

    /// Add an extension field
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }
}

/// Recorded when the primary provider could not be constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmFallbackInfo {
    pub primary_provider: String,
    pub fallback_provider: String,
    /// Redacted construction error of the primary provider
    pub reason: String,
}

/// Trait for LLM backend implementations
///
/// All providers implement this trait, so the review engine works with any
/// provider without knowing HTTP details.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Invoke the LLM with the given invocation parameters
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for any failure during invocation, including:
    /// - Transport failures (network errors, unreadable envelopes)
    /// - Provider errors (auth, quota, outages)
    /// - Timeouts
    /// - Budget exhaustion
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;

    /// Provider name for logs and history records
    fn provider_name(&self) -> &str;

    /// The caller could not use `result`; forget any stored copy of it.
    ///
    /// Backends that keep nothing leave this as a no-op.
    fn reject(&self, _result: &LlmResult) {}
}
