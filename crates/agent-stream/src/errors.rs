/// Errors returned by an [`EventSource`](crate::source::EventSource) while opening or reading a
/// response body, before they are normalized for the public session stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request or body read exceeded its deadline.
    #[error("transport timed out: {message}")]
    Timeout { message: String },
    /// The connection was closed while the body was still being read.
    #[error("transport aborted: {message}")]
    Aborted { message: String },
    /// The backend answered with a non-success HTTP status.
    #[error("backend returned status {status_code}: {message}")]
    Status { status_code: u16, message: String },
    /// Any other request or I/O failure.
    #[error("transport error: {message}")]
    Other { message: String },
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates an abort error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Creates a status error.
    pub fn status(status_code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a generic transport error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns `true` for failures that may end a partially delivered session gracefully.
    pub fn is_abort_or_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Aborted { .. })
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Timeout { message }
            | Self::Aborted { message }
            | Self::Status { message, .. }
            | Self::Other { message } => message,
        }
    }
}

/// Terminal session failure delivered through `StreamEvent::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamFailure {
    /// Timeout or abort before any content reached the caller.
    #[error("stream interrupted before any content: {message}")]
    Interrupted { message: String },
    /// Request rejected or transport failed.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        status_code: Option<u16>,
    },
}

/// Top-level error type for the public client API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid input to the run builder.
    #[error("validation error: {0}")]
    Validation(String),
    /// Terminal failure returned from a started session.
    #[error(transparent)]
    Failed(StreamFailure),
    /// The session was cancelled before it reached a terminal message.
    #[error("cancelled")]
    Cancelled,
    /// Internal misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

impl From<StreamFailure> for ClientError {
    fn from(value: StreamFailure) -> Self {
        ClientError::Failed(value)
    }
}

pub(crate) fn stream_failure_from_transport_error(err: &TransportError) -> StreamFailure {
    match err {
        TransportError::Timeout { message } | TransportError::Aborted { message } => {
            StreamFailure::Interrupted {
                message: message.clone(),
            }
        }
        TransportError::Status {
            status_code,
            message,
        } => StreamFailure::Transport {
            message: message.clone(),
            status_code: Some(*status_code),
        },
        TransportError::Other { message } => StreamFailure::Transport {
            message: message.clone(),
            status_code: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_abort_are_graceful_candidates() {
        assert!(TransportError::timeout("slow").is_abort_or_timeout());
        assert!(TransportError::aborted("reset").is_abort_or_timeout());
        assert!(!TransportError::status(502, "bad gateway").is_abort_or_timeout());
        assert!(!TransportError::other("dns").is_abort_or_timeout());
    }

    #[test]
    fn status_errors_keep_their_code_when_normalized() {
        let failure = stream_failure_from_transport_error(&TransportError::status(401, "nope"));
        assert_eq!(
            failure,
            StreamFailure::Transport {
                message: "nope".into(),
                status_code: Some(401),
            }
        );
    }
}
