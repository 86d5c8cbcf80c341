//! Cluster client errors

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists, or the resourceVersion was stale
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The call did not complete before the deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Deadline that was exceeded
        after: Duration,
    },

    /// Invalid request (e.g., missing name or namespace)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Any other Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),
}

impl ClusterError {
    /// Whether this error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }

    /// Whether this error is a write conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::Conflict(_))
    }
}

impl From<kube::Error> for ClusterError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ref response) if response.code == 404 => {
                ClusterError::NotFound(response.message.clone())
            }
            kube::Error::Api(ref response) if response.code == 409 => {
                ClusterError::Conflict(response.message.clone())
            }
            other => ClusterError::Kube(other),
        }
    }
}
