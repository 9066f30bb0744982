//! Shared HTTP client infrastructure for HTTP-based LLM providers
//!
//! One `reqwest::Client` is configured per backend and reused across calls,
//! with the timeout and retry policy every provider shares.

use crate::LlmError;
use clausecheck_utils::redaction::redact_credentials;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default maximum HTTP timeout (10 minutes); per-call timeouts are capped by it
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(600);

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts for 5xx and network failures
const MAX_RETRIES: u32 = 2;

/// Initial backoff duration for retries (1 second)
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Shared HTTP client for LLM providers
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Create a new HTTP client with a custom maximum timeout
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| {
                LlmError::Misconfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
        })
    }

    /// Start a POST request on the shared client
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-request timeout: `min(request_timeout, max_timeout)`
    /// - Up to 2 retries for 5xx and network failures, backoff 1s then 2s
    /// - No retries for 4xx errors or timeouts
    ///
    /// # Errors
    ///
    /// - `LlmError::ProviderAuth` for 401/403 errors
    /// - `LlmError::ProviderQuota` for 429 errors
    /// - `LlmError::ProviderOutage` for 5xx errors (after retries)
    /// - `LlmError::Timeout` for timeouts
    /// - `LlmError::Transport` for network errors (after retries)
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);

        let mut attempt = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    LlmError::Transport("Failed to clone request for retry".to_string())
                })?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {}", e)))?;

            debug!(
                provider = provider_name,
                attempt = attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() {
                        return Err(map_client_error(status, provider_name));
                    }

                    if status.is_server_error() {
                        if attempt <= MAX_RETRIES {
                            warn!(
                                provider = provider_name,
                                attempt = attempt,
                                status = status.as_u16(),
                                "Server error, will retry"
                            );
                            tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
                            continue;
                        }

                        return Err(LlmError::ProviderOutage(format!(
                            "{} returned server error: {}",
                            provider_name, status
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(LlmError::Timeout {
                            duration: effective_timeout,
                        });
                    }

                    let message = redact_credentials(&e.to_string());

                    if attempt <= MAX_RETRIES {
                        warn!(
                            provider = provider_name,
                            attempt = attempt,
                            error = %message,
                            "Network error, will retry"
                        );
                        tokio::time::sleep(INITIAL_BACKOFF * attempt).await;
                        continue;
                    }

                    return Err(LlmError::Transport(format!(
                        "{} request failed: {}",
                        provider_name, message
                    )));
                }
            }
        }
    }
}

/// Map HTTP client error status codes to LlmError variants
///
/// - 401/403 → `LlmError::ProviderAuth`
/// - 429 → `LlmError::ProviderQuota`
/// - Other 4xx → `LlmError::Transport`
pub(crate) fn map_client_error(status: StatusCode, provider_name: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::ProviderAuth(format!(
            "{} authentication failed: {}",
            provider_name, status
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{} rate limit exceeded: {}", provider_name, status))
        }
        _ => LlmError::Transport(format!(
            "{} returned client error: {}",
            provider_name, status
        )),
    }
}

/// Join a base URL and a path without doubling or dropping the slash
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
