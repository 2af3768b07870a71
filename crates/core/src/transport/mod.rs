//! Retrying request execution shared by the token and storage clients.

mod context;
mod error;
mod retry;

pub use context::{Interrupted, RunContext};
pub use error::{is_retryable_status, RetryError, TransportError};
pub use retry::{run_with_retry, status_error, RetryPolicy};
