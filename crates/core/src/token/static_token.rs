//! Fixed bearer token, for local runs outside GCP.

use async_trait::async_trait;

use super::{CredentialError, TokenProvider};
use crate::transport::RunContext;

/// Hands out the configured token verbatim.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _ctx: &RunContext) -> Result<String, CredentialError> {
        Ok(self.token.clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}
