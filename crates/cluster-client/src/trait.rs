//! DeploymentClient trait for mocking
//!
//! Abstracts the Kubernetes calls made for the managed Deployment so the
//! reconciler can be unit tested without a cluster.

use crate::error::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;

/// Cluster operations on the managed Deployment.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
/// Implementations must return [`ClusterError::NotFound`] when the object does
/// not exist; every other failure is treated as unexpected by callers.
#[async_trait::async_trait]
pub trait DeploymentClient: Send + Sync {
    /// Fetch a Deployment by namespace and name
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError>;

    /// Create a Deployment in the namespace carried by its metadata
    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;

    /// Replace an existing Deployment.
    ///
    /// `metadata.resourceVersion` must carry the version last read, so a
    /// concurrent writer surfaces as [`ClusterError::Conflict`].
    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError>;
}
