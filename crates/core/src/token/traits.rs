use async_trait::async_trait;
use thiserror::Error;

use crate::transport::{RetryError, RunContext};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Metadata(#[from] RetryError),
}

impl CredentialError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Metadata(err) if err.is_cancellation())
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer token for the storage API
    async fn token(&self, ctx: &RunContext) -> Result<String, CredentialError>;

    /// Name of this token source
    fn source_name(&self) -> &'static str;
}
