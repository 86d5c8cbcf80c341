//! Controller-specific error types.
//!
//! This module defines error types specific to the OpenTelemetry Collector
//! Controller that are not covered by upstream library errors.
//!
//! Cluster failures are wrapped once, with the identity of the Deployment
//! involved; the underlying `ClusterError` is kept intact as the source.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the OpenTelemetry Collector Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Fetching the existing Deployment failed for a reason other than absence
    #[error("Failed to fetch Deployment {namespace}/{name}: {source}")]
    Fetch {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// Creating the desired Deployment failed
    #[error("Failed to create Deployment {namespace}/{name}: {source}")]
    Create {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// Replacing a drifted Deployment failed
    #[error("Failed to update Deployment {namespace}/{name}: {source}")]
    Update {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },

    /// The owner reference could not be built
    #[error("Cannot set owner reference: {0}")]
    Ownership(String),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
