//! Error types for management API calls.
//!
//! Errors are categorized so callers can decide whether a call is worth
//! retrying and what to tell the user. Remote diagnostics are kept verbatim
//! in [`Error::detail`] instead of being parsed.

use std::fmt;

use crate::types::Operation;

/// Result type alias for management API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of management API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The remote system could not be reached, or answered with a server
    /// or throttling status (transient, retryable).
    Network,
    /// The management key is missing, wrong, or lacks permission.
    Unauthorized,
    /// The response body did not have the expected shape.
    Format,
    /// The remote system decoded the request and refused it.
    Rejected,
    /// The cluster does not exist.
    NotFound,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Could not reach the management API",
            Self::Unauthorized => "Management key was refused",
            Self::Format => "Unexpected response from the management API",
            Self::Rejected => "Request rejected by the management API",
            Self::NotFound => "Cluster not found",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your connection and the API base URL, then try again",
            Self::Unauthorized => {
                "Check the key in config.toml or TYPESENSE_MANAGEMENT_KEY and its permissions"
            }
            Self::Format => "The API may have changed; check for a newer release",
            Self::Rejected => "Read the remote detail below and fix the request",
            Self::NotFound => "Verify the cluster id, or drop it from tracked state",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors returned by [`ManagementApi`](crate::ManagementApi) implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Network or protocol failure reaching the remote system.
    #[error("transport error: {message}")]
    Transport {
        /// Error message, or the raw body for unexpected statuses.
        message: String,
        /// HTTP status code if a response was received.
        status: Option<u16>,
    },

    /// Response body does not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// Response decoded but carried `success = false`.
    #[error("{operation} was rejected: {body}")]
    RemoteRejected {
        /// Operation that was refused.
        operation: Operation,
        /// Raw response body, kept verbatim as diagnostic detail.
        body: String,
    },

    /// The remote system reports the identifier does not exist.
    #[error("cluster not found: {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },
}

impl Error {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transport {
            message: message.into(),
            status,
        }
    }

    /// Create a not-found error for a cluster id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Unauthorized,
            Self::Transport {
                status: Some(status),
                ..
            } if is_client_error(*status) => ErrorCategory::Rejected,
            Self::Transport { .. } => ErrorCategory::Network,
            Self::Decode(_) => ErrorCategory::Format,
            Self::RemoteRejected { .. } => ErrorCategory::Rejected,
            Self::NotFound { .. } => ErrorCategory::NotFound,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the remote reported the cluster as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Raw remote diagnostic text, when the remote sent any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::RemoteRejected { body, .. } => Some(body),
            Self::Transport {
                message,
                status: Some(_),
            } => Some(message),
            _ => None,
        }
    }
}

/// 4xx statuses that retrying will not fix. 408 and 429 are transient.
fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 408 | 429)
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Transport {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Transport {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
