//! Kubernetes-backed Deployment client
//!
//! Wraps `kube::Api<Deployment>` and bounds every call with a deadline.

use crate::deployment_trait::DeploymentClient;
use crate::error::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::PostParams;
use kube::{Api, Client};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Default deadline for a single API call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Field manager recorded on writes
pub const FIELD_MANAGER: &str = "opentelemetry-operator";

/// Deployment client talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeDeploymentClient {
    client: Client,
    timeout: Duration,
}

impl std::fmt::Debug for KubeDeploymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeDeploymentClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl KubeDeploymentClient {
    /// Create a new client with the default deadline
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-call deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

/// Runs `call`, giving up with [`ClusterError::Timeout`] after `timeout`
///
/// The call future is dropped on timeout, which cancels the request.
pub async fn with_deadline<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, ClusterError>
where
    F: Future<Output = Result<T, kube::Error>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(ClusterError::from),
        Err(_elapsed) => Err(ClusterError::Timeout {
            operation,
            after: timeout,
        }),
    }
}

/// Namespace and name of a Deployment about to be written
fn identity(deployment: &Deployment) -> Result<(&str, &str), ClusterError> {
    let namespace = deployment.metadata.namespace.as_deref()
        .ok_or_else(|| ClusterError::InvalidRequest("Deployment missing namespace".to_string()))?;
    let name = deployment.metadata.name.as_deref()
        .ok_or_else(|| ClusterError::InvalidRequest("Deployment missing name".to_string()))?;
    Ok((namespace, name))
}

#[async_trait::async_trait]
impl DeploymentClient for KubeDeploymentClient {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        debug!("Fetching Deployment {}/{}", namespace, name);
        let api = self.api(namespace);
        with_deadline(self.timeout, "get deployment", api.get(name)).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (namespace, name) = identity(deployment)?;
        debug!("Creating Deployment {}/{}", namespace, name);
        let api = self.api(namespace);
        let pp = Self::post_params();
        with_deadline(self.timeout, "create deployment", api.create(&pp, deployment)).await
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let (namespace, name) = identity(deployment)?;
        if deployment.metadata.resource_version.is_none() {
            return Err(ClusterError::InvalidRequest(format!(
                "Deployment {}/{} replace requires a resourceVersion",
                namespace, name
            )));
        }
        debug!("Replacing Deployment {}/{}", namespace, name);
        let api = self.api(namespace);
        let pp = Self::post_params();
        with_deadline(self.timeout, "replace deployment", api.replace(name, &pp, deployment)).await
    }
}
