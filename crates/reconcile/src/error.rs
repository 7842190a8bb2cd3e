//! Error types for lifecycle operations.
//!
//! Failures that leave a cluster half-provisioned carry the assigned id and
//! a record in phase [`Phase::Error`], so the caller can persist it instead
//! of losing track of a remote resource it is paying for.

use crate::types::{ClusterRecord, Phase, Verb};
use std::fmt;
use std::time::Duration;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport failure (transient, retryable)
    Network,
    /// Management key refused
    Unauthorized,
    /// Unexpected response shape
    Format,
    /// Remote refused the request
    Rejected,
    /// Entity does not exist remotely
    NotFound,
    /// Provisioning did not finish in time
    Timeout,
    /// Operation was cancelled by the caller
    Cancelled,
    /// Operation not allowed in the current phase
    Precondition,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Could not reach the management API",
            Self::Unauthorized => "Management key was refused",
            Self::Format => "Unexpected response from the management API",
            Self::Rejected => "Request rejected by the management API",
            Self::NotFound => "Cluster not found",
            Self::Timeout => "Cluster did not become ready in time",
            Self::Cancelled => "Operation cancelled",
            Self::Precondition => "Operation not allowed in the current state",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your connection and try again",
            Self::Unauthorized => {
                "Check the key in config.toml or TYPESENSE_MANAGEMENT_KEY and its permissions"
            }
            Self::Format => "The API may have changed; check for a newer release",
            Self::Rejected => "Read the remote detail and fix the configuration",
            Self::NotFound => "Verify the cluster id, or refresh to drop it from state",
            Self::Timeout => "The cluster is still tracked; run refresh later to pick it up",
            Self::Cancelled => "The cluster is still tracked; run refresh to see where it got to",
            Self::Precondition => "Run refresh, or destroy and recreate the entity",
        }
    }
}

impl From<cloudapi::ErrorCategory> for ErrorCategory {
    fn from(category: cloudapi::ErrorCategory) -> Self {
        match category {
            cloudapi::ErrorCategory::Network => Self::Network,
            cloudapi::ErrorCategory::Unauthorized => Self::Unauthorized,
            cloudapi::ErrorCategory::Format => Self::Format,
            cloudapi::ErrorCategory::Rejected => Self::Rejected,
            cloudapi::ErrorCategory::NotFound => Self::NotFound,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors returned by lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A remote call failed; tracked state is unchanged.
    #[error(transparent)]
    Api(#[from] cloudapi::Error),

    /// A poll failed after the cluster was created.
    #[error("cluster {id} was created but polling failed: {source}")]
    Provisioning {
        id: String,
        record: Box<ClusterRecord>,
        #[source]
        source: cloudapi::Error,
    },

    /// The cluster did not reach `in_service` before the deadline.
    #[error("cluster {id} still {last_status} after {}s", .waited.as_secs())]
    ProvisioningTimeout {
        id: String,
        waited: Duration,
        last_status: String,
        record: Box<ClusterRecord>,
    },

    /// The wait was cancelled.
    #[error("cancelled while cluster {id} was {last_status}")]
    Cancelled {
        id: String,
        last_status: String,
        record: Box<ClusterRecord>,
    },

    /// A patch or the follow-up fetch failed; the remote may have changed.
    #[error("update of cluster {id} failed: {source}")]
    UpdateFailed {
        id: String,
        record: Box<ClusterRecord>,
        #[source]
        source: cloudapi::Error,
    },

    /// The verb is not allowed from the entity's phase.
    #[error("cannot {verb} from phase {phase}: {message}")]
    Precondition {
        verb: Verb,
        phase: Phase,
        message: String,
    },
}

impl Error {
    /// Create a precondition error.
    pub fn precondition(verb: Verb, phase: Phase, message: impl Into<String>) -> Self {
        Self::Precondition {
            verb,
            phase,
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Api(e)
            | Self::Provisioning { source: e, .. }
            | Self::UpdateFailed { source: e, .. } => e.category().into(),
            Self::ProvisioningTimeout { .. } => ErrorCategory::Timeout,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
            Self::Precondition { .. } => ErrorCategory::Precondition,
        }
    }

    /// Raw remote diagnostic text, when there is any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api(e)
            | Self::Provisioning { source: e, .. }
            | Self::UpdateFailed { source: e, .. } => e.detail(),
            _ => None,
        }
    }

    /// Record to persist after a failure that touched the remote.
    ///
    /// Always in phase [`Phase::Error`].
    pub fn partial_record(&self) -> Option<&ClusterRecord> {
        match self {
            Self::Provisioning { record, .. }
            | Self::UpdateFailed { record, .. }
            | Self::ProvisioningTimeout { record, .. }
            | Self::Cancelled { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Id of the cluster the failure left behind.
    pub fn cluster_id(&self) -> Option<&str> {
        match self {
            Self::Provisioning { id, .. }
            | Self::UpdateFailed { id, .. }
            | Self::ProvisioningTimeout { id, .. }
            | Self::Cancelled { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Whether the remote reported the entity as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_not_found())
    }
}
