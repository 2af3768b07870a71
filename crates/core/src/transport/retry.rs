//! Bounded retry with exponential backoff.
//!
//! Every attempt runs under its own sub-deadline derived from the caller's
//! [`RunContext`]. Cancellation and the caller's deadline end the loop at once
//! and are never retried.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::context::RunContext;
use super::error::{RetryError, TransportError};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Budget for a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from the shared retry settings and an operation-specific timeout.
    pub fn from_config(config: &crate::config::RetryConfig, attempt_timeout: Duration) -> Self {
        Self {
            attempts: config.attempts,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
            attempt_timeout,
        }
        .normalized()
    }

    /// At least one attempt, and a cap no smaller than the first backoff.
    pub fn normalized(mut self) -> Self {
        self.attempts = self.attempts.max(1);
        if self.max_backoff < self.initial_backoff {
            self.max_backoff = self.initial_backoff;
        }
        self
    }

    /// Delay before retry number `retry` (0 for the wait after the first failure).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or attempts run out.
///
/// The closure receives the per-attempt context; requests it issues should
/// honour that context so a stuck attempt is abandoned at its own timeout.
pub async fn run_with_retry<T, F, Fut>(
    ctx: &RunContext,
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, RetryError>
where
    F: FnMut(RunContext) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let policy = policy.clone().normalized();
    let fail = |attempts: u32, source: TransportError| RetryError {
        operation: operation.to_string(),
        attempts,
        source,
    };

    let mut number = 0u32;
    loop {
        number += 1;
        ctx.check().map_err(|i| fail(number - 1, i.into()))?;

        let attempt_ctx = ctx.with_timeout(policy.attempt_timeout);
        let result = match attempt_ctx.run(attempt(attempt_ctx.clone())).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::AttemptTimeout {
                timeout: policy.attempt_timeout,
            }),
        };
        attempt_ctx.cancel();

        let err = match result {
            Ok(value) => {
                if number > 1 {
                    debug!(operation, attempt = number, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        // The caller's own cancellation or deadline outranks whatever the attempt saw.
        if let Err(interrupted) = ctx.check() {
            return Err(fail(number, interrupted.into()));
        }

        if !err.is_retryable() || number >= policy.attempts {
            return Err(fail(number, err));
        }

        let backoff = policy.backoff_for(number - 1);
        warn!(
            operation,
            attempt = number,
            max_attempts = policy.attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Attempt failed, retrying"
        );

        ctx.sleep(backoff)
            .await
            .map_err(|i| fail(number, i.into()))?;
    }
}

/// Turns a non-success response into [`TransportError::Status`], keeping at most
/// `limit` bytes of the body for diagnostics.
pub async fn status_error(mut response: reqwest::Response, limit: usize) -> TransportError {
    let status = response.status().as_u16();
    let mut body = Vec::new();
    while body.len() < limit {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = (limit - body.len()).min(chunk.len());
                body.extend_from_slice(&chunk[..take]);
            }
            _ => break,
        }
    }
    let body = String::from_utf8_lossy(&body).trim().to_string();
    TransportError::status(status, body)
}
