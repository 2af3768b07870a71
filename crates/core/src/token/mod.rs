mod metadata;
mod static_token;
mod traits;

pub use metadata::*;
pub use static_token::*;
pub use traits::*;

use std::sync::Arc;

use crate::config::{RetryConfig, TokenConfig};
use crate::transport::RetryPolicy;

/// Factory function to create the token source from config.
///
/// A non-blank configured token wins; otherwise tokens come from the metadata server.
pub fn create_token_provider(
    token: &TokenConfig,
    retry: &RetryConfig,
    client: reqwest::Client,
) -> Arc<dyn TokenProvider> {
    match token.access_token.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => Arc::new(StaticTokenProvider::new(value)),
        _ => Arc::new(MetadataTokenProvider::new(
            client,
            token.metadata_url.clone(),
            RetryPolicy::from_config(retry, retry.token_timeout()),
        )),
    }
}
