//! Mock token provider for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::token::{CredentialError, TokenProvider};
use crate::transport::{RetryError, RunContext, TransportError};

/// Hands out a fixed token, or fails like an unreachable metadata server.
#[derive(Debug, Clone)]
pub struct MockTokenProvider {
    token: String,
    fail: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl Default for MockTokenProvider {
    fn default() -> Self {
        Self::new("test-token")
    }
}

impl MockTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            fail: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make subsequent requests fail with a 503 after three attempts.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn token(&self, ctx: &RunContext) -> Result<String, CredentialError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let source = match ctx.check() {
            Err(i) => Some(TransportError::from(i)),
            Ok(()) if self.fail.load(Ordering::SeqCst) => {
                Some(TransportError::status(503, "metadata unavailable"))
            }
            Ok(()) => None,
        };
        match source {
            Some(source) => Err(CredentialError::Metadata(RetryError {
                operation: "metadata token".to_string(),
                attempts: 3,
                source,
            })),
            None => Ok(self.token.clone()),
        }
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}
