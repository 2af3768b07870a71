//! Token fetched from the instance metadata server (Cloud Run, GCE, GKE).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{CredentialError, TokenProvider};
use crate::transport::{run_with_retry, status_error, RetryPolicy, RunContext, TransportError};

/// Default metadata endpoint for the attached service account.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const MAX_TOKEN_RESPONSE_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

pub struct MetadataTokenProvider {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl MetadataTokenProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            url: url.into(),
            policy,
        }
    }

    async fn fetch_once(&self, ctx: RunContext) -> Result<String, TransportError> {
        let mut response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, MAX_TOKEN_RESPONSE_BYTES).await);
        }

        let mut body = Vec::new();
        while let Some(chunk) = ctx.run(response.chunk()).await?? {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_TOKEN_RESPONSE_BYTES {
                return Err(TransportError::invalid_response(
                    "metadata token response too large",
                ));
            }
        }

        let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            TransportError::invalid_response(format!("metadata token parse: {e}"))
        })?;
        if parsed.access_token.is_empty() {
            return Err(TransportError::invalid_response(
                "metadata token missing access_token",
            ));
        }
        Ok(parsed.access_token)
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn token(&self, ctx: &RunContext) -> Result<String, CredentialError> {
        let token = run_with_retry(ctx, &self.policy, "metadata token", |attempt| {
            self.fetch_once(attempt)
        })
        .await?;
        debug!(url = %self.url, "Fetched metadata access token");
        Ok(token)
    }

    fn source_name(&self) -> &'static str {
        "metadata"
    }
}
