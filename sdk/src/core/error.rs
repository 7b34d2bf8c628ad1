//! Labellerr SDK Error Definitions
//!
//! Every failure that reaches a caller is classified into exactly one of five kinds:
//! validation, transport, timeout, processing-failed and internal.

use std::any::Any;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::jobs::JobStatus;
use super::Metadata;

/// Shared, cloneable underlying failure
pub type ErrorCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Error kind (the taxonomy, independent of the payload each variant carries)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Local precondition check failed before any network I/O
    Validation,
    /// Network/HTTP-layer failure
    Transport,
    /// Poll budget or caller wait elapsed
    Timeout,
    /// The platform reported a terminal failure for the job
    ProcessingFailed,
    /// Anything that fits none of the above
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "ValidationError"),
            ErrorKind::Transport => write!(f, "TransportError"),
            ErrorKind::Timeout => write!(f, "TimeoutError"),
            ErrorKind::ProcessingFailed => write!(f, "ProcessingFailedError"),
            ErrorKind::Internal => write!(f, "InternalError"),
        }
    }
}

/// Which budget ran out for a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutOrigin {
    /// The status poller's own budget elapsed
    Poller,
    /// The caller's wait on an async handle elapsed
    CallerWait,
}

impl std::fmt::Display for TimeoutOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutOrigin::Poller => write!(f, "poll budget exhausted"),
            TimeoutOrigin::CallerWait => write!(f, "caller wait elapsed"),
        }
    }
}

/// Client error types
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status, when the server answered at all
        status: Option<u16>,
        #[source]
        cause: Option<ErrorCause>,
    },

    #[error("Timeout ({origin}): {message}")]
    Timeout {
        origin: TimeoutOrigin,
        message: String,
        /// Last non-terminal status observed before giving up
        last_status: Option<JobStatus>,
    },

    #[error("Processing failed for job {job_id}: {message}")]
    ProcessingFailed {
        job_id: String,
        message: String,
        /// Whatever the platform reported alongside the failure
        metadata: Metadata,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        cause: Option<ErrorCause>,
    },
}

/// Client result type
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport {
            message: message.into(),
            status: None,
            cause: None,
        }
    }

    /// Transport failure for a non-success HTTP status
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        ClientError::Transport {
            message: message.into(),
            status: Some(status),
            cause: None,
        }
    }

    pub fn transport_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::Transport {
            message: message.into(),
            status: None,
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ClientError::Internal {
            message: message.into(),
            cause: None,
        }
    }

    pub fn internal_with_cause(
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::Internal {
            message: message.into(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn poll_timeout(message: impl Into<String>, last_status: Option<JobStatus>) -> Self {
        ClientError::Timeout {
            origin: TimeoutOrigin::Poller,
            message: message.into(),
            last_status,
        }
    }

    pub fn caller_timeout(message: impl Into<String>, last_status: Option<JobStatus>) -> Self {
        ClientError::Timeout {
            origin: TimeoutOrigin::CallerWait,
            message: message.into(),
            last_status,
        }
    }

    pub fn processing_failed(
        job_id: impl Into<String>,
        message: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        ClientError::ProcessingFailed {
            job_id: job_id.into(),
            message: message.into(),
            metadata,
        }
    }

    /// Converts a caught panic payload into an internal error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ClientError::internal(format!("Operation panicked: {}", detail))
    }

    /// Returns the taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::Transport { .. } => ErrorKind::Transport,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::ProcessingFailed { .. } => ErrorKind::ProcessingFailed,
            ClientError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            ClientError::Validation { message }
            | ClientError::Transport { message, .. }
            | ClientError::Timeout { message, .. }
            | ClientError::ProcessingFailed { message, .. }
            | ClientError::Internal { message, .. } => message,
        }
    }

    /// HTTP status attached to a transport error
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            ClientError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn timeout_origin(&self) -> Option<TimeoutOrigin> {
        match self {
            ClientError::Timeout { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        match self {
            ClientError::Timeout { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Returns true when a status check that failed this way is worth retrying.
    ///
    /// Connection-level failures (no status), 408, 429 and 5xx are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport { status: None, .. } => true,
            ClientError::Transport {
                status: Some(code), ..
            } => *code == 408 || *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Transport {
            message: format!("Malformed response: {}", e),
            status: None,
            cause: Some(Arc::new(e)),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::internal_with_cause(format!("IO error: {}", e), e)
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_panic() {
            ClientError::from_panic(e.into_panic())
        } else {
            ClientError::internal("Background task was aborted")
        }
    }
}

#[cfg(feature = "http-transport")]
impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let message = if e.is_timeout() {
            format!("Request timed out: {}", e)
        } else if e.is_connect() {
            format!("Connection failed: {}", e)
        } else if e.is_decode() {
            format!("Malformed response: {}", e)
        } else {
            format!("Network error: {}", e)
        };
        ClientError::Transport {
            message,
            status,
            cause: Some(Arc::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(ClientError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(ClientError::transport("x").kind(), ErrorKind::Transport);
        assert_eq!(
            ClientError::poll_timeout("x", None).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            ClientError::processing_failed("job", "x", Metadata::new()).kind(),
            ErrorKind::ProcessingFailed
        );
        assert_eq!(ClientError::internal("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_display_names() {
        assert_eq!(ErrorKind::Validation.to_string(), "ValidationError");
        assert_eq!(ErrorKind::ProcessingFailed.to_string(), "ProcessingFailedError");
    }

    #[test]
    fn test_timeouts_are_same_kind_but_distinguishable() {
        let poller = ClientError::poll_timeout("budget", Some(JobStatus::Processing));
        let caller = ClientError::caller_timeout("wait", Some(JobStatus::Queued));

        assert_eq!(poller.kind(), caller.kind());
        assert_eq!(poller.timeout_origin(), Some(TimeoutOrigin::Poller));
        assert_eq!(caller.timeout_origin(), Some(TimeoutOrigin::CallerWait));
        assert_eq!(poller.last_status(), Some(JobStatus::Processing));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ClientError::transport("connection reset").is_retryable());
        assert!(ClientError::http_status(429, "slow down").is_retryable());
        assert!(ClientError::http_status(503, "unavailable").is_retryable());
        assert!(!ClientError::http_status(404, "missing").is_retryable());
        assert!(!ClientError::validation("bad").is_retryable());
    }

    #[test]
    fn test_json_error_is_transport_with_cause() {
        let err: ClientError = serde_json::from_str::<serde_json::Value>("{oops")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.message().starts_with("Malformed response"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_is_internal() {
        let err: ClientError = std::io::Error::other("disk gone").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_from_panic_extracts_message() {
        let err = ClientError::from_panic(Box::new("boom"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.message().contains("boom"));

        let err = ClientError::from_panic(Box::new(String::from("owned boom")));
        assert!(err.message().contains("owned boom"));
    }

    #[test]
    fn test_errors_are_cloneable_with_cause() {
        let err = ClientError::internal_with_cause("wrapped", std::io::Error::other("inner"));
        let cloned = err.clone();
        assert_eq!(cloned.message(), "wrapped");
        assert!(cloned.source().is_some());
    }
}
