use crate::backends::LlmBackend;
use async_trait::async_trait;
use crewmaster_core::{CrewmasterError, CrewmasterResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Retry behaviour for provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries per backend after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub backoff_base_ms: u64,
    /// Cap on the backoff delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Whether a provider failure is transient and worth retrying.
///
/// Rate limits (429), server errors (5xx) and timeouts are retried. Bad
/// requests and credential failures (400, 401, 403) are not.
pub fn is_retryable(err: &CrewmasterError) -> bool {
    let CrewmasterError::Provider(msg) = err.root() else {
        return false;
    };
    let lower = msg.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has = |needle: &str| tokens.contains(&needle);

    if has("400") || has("401") || has("403") {
        return false;
    }

    has("429")
        || has("timeout")
        || has("timed")
        || has("5xx")
        || has("500")
        || has("502")
        || has("503")
        || has("504")
        || has("connection")
}

/// Exponential backoff for `attempt`, capped at `backoff_max_ms`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let delay = policy
        .backoff_base_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    delay.min(policy.backoff_max_ms)
}

/// Backend that tries several backends in order, retrying transient
/// failures with exponential backoff.
///
/// Every attempt is bounded by `attempt_timeout`; an attempt that exceeds it
/// is treated as a retryable provider failure. When all backends are
/// exhausted the last error is returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn LlmBackend>>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl FailoverBackend {
    pub fn new(
        backends: Vec<Box<dyn LlmBackend>>,
        policy: RetryPolicy,
        attempt_timeout: Duration,
    ) -> CrewmasterResult<Self> {
        if backends.is_empty() {
            return Err(CrewmasterError::Config(
                "failover requires at least one backend".into(),
            ));
        }
        Ok(Self {
            backends,
            policy,
            attempt_timeout,
        })
    }

    async fn attempt(
        &self,
        backend: &dyn LlmBackend,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> CrewmasterResult<String> {
        match tokio::time::timeout(self.attempt_timeout, backend.complete(system_prompt, prompt))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CrewmasterError::Provider(format!(
                "timeout after {} ms",
                self.attempt_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl LlmBackend for FailoverBackend {
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> CrewmasterResult<String> {
        let mut last_err: Option<CrewmasterError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            for attempt in 0..=self.policy.max_retries {
                match self.attempt(backend.as_ref(), system_prompt, prompt).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if !is_retryable(&e) {
                            warn!(
                                backend = backend_idx,
                                attempt,
                                error = %e,
                                "Non-retryable provider error, moving to next backend"
                            );
                            last_err = Some(e);
                            break;
                        }

                        if attempt < self.policy.max_retries {
                            let delay = compute_backoff(&self.policy, attempt);
                            info!(
                                backend = backend_idx,
                                attempt,
                                delay_ms = delay,
                                error = %e,
                                "Retryable provider error, backing off"
                            );
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                        last_err = Some(e);
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| CrewmasterError::Provider("all provider backends exhausted".into())))
    }
}
