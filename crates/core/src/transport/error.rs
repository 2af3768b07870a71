//! Error types for the transport layer.

use std::time::Duration;
use thiserror::Error;

use super::context::Interrupted;

/// A single failed attempt against a remote endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("{}", format_status(*status, body))]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("network error: {message}")]
    Network { message: String, retryable: bool },

    /// The attempt outlived its own timeout while the run was still alive.
    #[error("attempt timed out after {timeout:?}")]
    AttemptTimeout { timeout: Duration },

    /// The run was cancelled or hit its deadline.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// Local file I/O while streaming a body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered 2xx with something unusable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn format_status(status: u16, body: &str) -> String {
    if body.is_empty() {
        format!("status={status}")
    } else {
        format!("status={status} body={body}")
    }
}

/// 429 and every 5xx are worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

impl TransportError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse(reason.into())
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retryable_status(*status),
            Self::Network { retryable, .. } => *retryable,
            Self::AttemptTimeout { .. } => true,
            Self::Io(_) | Self::Interrupted(_) | Self::InvalidResponse(_) => false,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let retryable = err.is_timeout()
            || err.is_connect()
            || ((err.is_body() || err.is_decode()) && interrupted_io(&err));

        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }

        Self::Network { message, retryable }
    }
}

/// Whether the error chain holds an I/O error from a dropped connection.
fn interrupted_io(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            );
        }
        source = cause.source();
    }
    false
}

/// The final error of a retried operation.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: TransportError,
}

impl RetryError {
    pub fn is_cancellation(&self) -> bool {
        self.source.is_cancellation()
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure_is_retryable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{addr}/"))
            .send()
            .await
            .unwrap_err();
        assert!(TransportError::from(err).is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_request_is_fatal() {
        let err = reqwest::Client::new()
            .get("http://exa mple.invalid/")
            .send()
            .await
            .unwrap_err();
        let err = TransportError::from(err);
        assert!(!err.is_retryable());
        assert!(matches!(err, TransportError::Network { .. }));
    }

    #[test]
    fn test_interrupted_io_walks_source_chain() {
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(interrupted_io(&reset));

        let other = std::io::Error::other("closed");
        assert!(!interrupted_io(&other));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!interrupted_io(&denied));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TransportError::status(503, "").to_string(), "status=503");
        assert_eq!(
            TransportError::status(400, "bad name").to_string(),
            "status=400 body=bad name"
        );
    }

    #[test]
    fn test_interrupted_never_retryable() {
        let err = TransportError::from(Interrupted::DeadlineExceeded);
        assert!(!err.is_retryable());
        assert!(err.is_cancellation());
    }
}
