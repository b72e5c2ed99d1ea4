//! Crate-wide error taxonomy (spec §7).

use crate::domain::{ClusterName, SliceId};

/// Top-level error type returned by `Manager` operations.
#[derive(Debug, thiserror::Error)]
pub enum TnError {
    /// An operation was attempted on an agent client that is not connected.
    #[error("agent client for {cluster} is not connected")]
    NotConnected {
        /// Cluster whose client was not connected.
        cluster: ClusterName,
    },

    /// The agent's `/health` endpoint could not be reached.
    #[error("agent {cluster} unreachable: {reason}")]
    Unreachable {
        /// Cluster that was unreachable.
        cluster: ClusterName,
        /// Underlying transport error message.
        reason: String,
    },

    /// The agent's `/health` endpoint responded with a non-200 status.
    #[error("agent {cluster} rejected health check: status {status}")]
    HealthRejected {
        /// Cluster that rejected the health check.
        cluster: ClusterName,
        /// HTTP status code returned.
        status: u16,
    },

    /// An agent refused a configure/command call.
    #[error("agent {cluster} rejected config: status {status}, body {body}")]
    ConfigRejected {
        /// Cluster that rejected the request.
        cluster: ClusterName,
        /// HTTP status code returned.
        status: u16,
        /// Response body returned.
        body: String,
    },

    /// A VXLAN config failed validation before any I/O was attempted.
    #[error("invalid VXLAN config: {field}: {reason}")]
    InvalidVxlan {
        /// Field that failed validation.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A QoS strategy failed validation before any I/O was attempted.
    #[error("invalid QoS strategy: {field}: {reason}")]
    InvalidQos {
        /// Field that failed validation.
        field: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A performance test completed with a non-200 or unparseable body.
    #[error("performance test failed on {cluster}: {reason}")]
    TestFailed {
        /// Cluster the test ran against.
        cluster: ClusterName,
        /// Human-readable reason.
        reason: String,
    },

    /// A reconfigure/update was attempted on a slice with no prior config.
    #[error("no prior state for slice {slice}")]
    StateMissing {
        /// Slice with no prior config.
        slice: SliceId,
    },

    /// The operation's cancellation handle fired mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Fan-out aggregate, ordered by cluster name for stable comparison.
    #[error("{failed_count} of {attempted} clusters failed")]
    MultiError {
        /// Per-cluster errors, ordered by cluster name.
        errors: Vec<(ClusterName, Box<TnError>)>,
        /// Number of clusters present in `errors`, cached for the Display impl.
        failed_count: usize,
        /// Total number of clusters attempted.
        attempted: usize,
    },

    /// An underlying configuration value was invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl TnError {
    /// Build a [`TnError::MultiError`] from per-cluster failures, sorting by
    /// cluster name for stable, deterministic comparison (spec §7).
    #[must_use]
    pub fn multi(mut errors: Vec<(ClusterName, TnError)>, attempted: usize) -> Self {
        errors.sort_by(|a, b| a.0.cmp(&b.0));
        let failed_count = errors.len();
        Self::MultiError {
            errors: errors.into_iter().map(|(c, e)| (c, Box::new(e))).collect(),
            failed_count,
            attempted,
        }
    }

    /// Render a one-line-per-cluster detail string for a [`TnError::MultiError`].
    /// Returns an empty string for every other variant.
    #[must_use]
    pub fn multi_error_detail(&self) -> String {
        match self {
            Self::MultiError { errors, .. } => errors
                .iter()
                .map(|(cluster, err)| format!("{cluster}: {err}"))
                .collect::<Vec<_>>()
                .join("; "),
            _ => String::new(),
        }
    }
}
