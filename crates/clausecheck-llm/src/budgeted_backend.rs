//! Budgeted backend wrapper for LLM call limiting
//!
//! Wraps any `LlmBackend` and caps the number of invocations per process.
//! Used for cost control with paid HTTP providers.

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// A wrapper around an `LlmBackend` that enforces a limit on invocations.
///
/// The budget counts attempted calls, not successful ones: a failed call
/// still consumes its slot, so schema-correction retries cannot bypass the cap.
pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    /// Create a new budgeted backend with the specified limit
    #[must_use]
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(
            limit = limit,
            provider = inner.provider_name(),
            "Creating BudgetedBackend"
        );
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Number of calls attempted so far
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        // Count before calling so concurrent chunks cannot overshoot the limit
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            let attempted = current + 1;
            warn!(
                limit = self.limit,
                attempted = attempted,
                stage = %inv.stage,
                "Budget limit exceeded"
            );
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted,
            });
        }

        debug!(
            call_count = current + 1,
            limit = self.limit,
            "Budget check passed, invoking inner backend"
        );

        let result = self.inner.invoke(inv).await;

        if let Err(e) = &result {
            debug!(
                call_count = current + 1,
                limit = self.limit,
                error = %e,
                "Inner backend invocation failed (budget slot still consumed)"
            );
        }

        result
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn reject(&self, result: &LlmResult) {
        self.inner.reject(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;
    use std::sync::Arc;
    use std::time::Duration;

    struct MockSuccessBackend;

    #[async_trait]
    impl LlmBackend for MockSuccessBackend {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Ok(LlmResult::new("{\"findings\":[]}", "mock", "mock-model"))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    struct MockFailureBackend;

    #[async_trait]
    impl LlmBackend for MockFailureBackend {
        async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
            Err(LlmError::Transport("mock failure".to_string()))
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }

    fn create_test_invocation() -> LlmInvocation {
        LlmInvocation::new(
            "run-1",
            "analyzing",
            "test-model",
            Duration::from_secs(60),
            vec![Message::user("test message")],
        )
    }

    #[tokio::test]
    async fn test_budget_allows_calls_under_limit() {
        let backend = BudgetedBackend::new(Box::new(MockSuccessBackend), 3);
        for expected in 1..=3 {
            assert!(backend.invoke(create_test_invocation()).await.is_ok());
            assert_eq!(backend.call_count(), expected);
        }
        assert_eq!(backend.provider_name(), "mock");
    }

    #[tokio::test]
    async fn test_budget_fails_at_limit() {
        let backend = BudgetedBackend::new(Box::new(MockSuccessBackend), 2);
        backend.invoke(create_test_invocation()).await.unwrap();
        backend.invoke(create_test_invocation()).await.unwrap();

        match backend.invoke(create_test_invocation()).await {
            Err(LlmError::BudgetExceeded { limit, attempted }) => {
                assert_eq!(limit, 2);
                assert_eq!(attempted, 3);
            }
            other => panic!("Expected BudgetExceeded error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_budget_tracks_failed_calls() {
        let backend = BudgetedBackend::new(Box::new(MockFailureBackend), 1);

        let first = backend.invoke(create_test_invocation()).await;
        assert!(matches!(first, Err(LlmError::Transport(_))));

        let second = backend.invoke(create_test_invocation()).await;
        assert!(matches!(second, Err(LlmError::BudgetExceeded { .. })));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_calls_never_exceed_limit() {
        let backend = Arc::new(BudgetedBackend::new(Box::new(MockSuccessBackend), 5));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let backend = Arc::clone(&backend);
            handles.push(tokio::spawn(async move {
                backend.invoke(create_test_invocation()).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);
        assert_eq!(backend.call_count(), 20);
    }
}
