//! Mock DeploymentClient for unit testing
//!
//! Stores Deployments in memory keyed by namespace and name, counts calls,
//! and can be told to fail the next call of a given kind.

use crate::deployment_trait::DeploymentClient;
use crate::error::ClusterError;
use k8s_openapi::api::apps::v1::Deployment;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    deployments: BTreeMap<Key, Deployment>,
    created: Vec<Deployment>,
    replaced: Vec<Deployment>,
    get_calls: usize,
    create_calls: usize,
    replace_calls: usize,
    next_resource_version: u64,
    fail_next_get: Option<ClusterError>,
    fail_next_create: Option<ClusterError>,
    fail_next_replace: Option<ClusterError>,
}

/// Mock Deployment client for testing
///
/// Clones share the same in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MockDeploymentClient {
    state: Arc<Mutex<State>>,
}

impl MockDeploymentClient {
    /// Create an empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an existing Deployment (for test setup)
    pub fn add_deployment(&self, deployment: Deployment) {
        let key = key_of(&deployment);
        self.lock().deployments.insert(key, deployment);
    }

    /// Make the next `get_deployment` call fail with `error`
    pub fn fail_next_get(&self, error: ClusterError) {
        self.lock().fail_next_get = Some(error);
    }

    /// Make the next `create_deployment` call fail with `error`
    pub fn fail_next_create(&self, error: ClusterError) {
        self.lock().fail_next_create = Some(error);
    }

    /// Make the next `replace_deployment` call fail with `error`
    pub fn fail_next_replace(&self, error: ClusterError) {
        self.lock().fail_next_replace = Some(error);
    }

    /// Stored Deployment, if any
    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.lock().deployments.get(&(namespace.to_string(), name.to_string())).cloned()
    }

    /// Deployments passed to successful `create_deployment` calls, in order
    pub fn created(&self) -> Vec<Deployment> {
        self.lock().created.clone()
    }

    /// Deployments passed to successful `replace_deployment` calls, in order
    pub fn replaced(&self) -> Vec<Deployment> {
        self.lock().replaced.clone()
    }

    /// Number of `get_deployment` calls
    pub fn get_calls(&self) -> usize {
        self.lock().get_calls
    }

    /// Number of `create_deployment` calls, including failed ones
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    /// Number of `replace_deployment` calls, including failed ones
    pub fn replace_calls(&self) -> usize {
        self.lock().replace_calls
    }
}

fn key_of(deployment: &Deployment) -> Key {
    (
        deployment.metadata.namespace.clone().unwrap_or_default(),
        deployment.metadata.name.clone().unwrap_or_default(),
    )
}

#[async_trait::async_trait]
impl DeploymentClient for MockDeploymentClient {
    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        let mut state = self.lock();
        state.get_calls += 1;
        if let Some(error) = state.fail_next_get.take() {
            return Err(error);
        }
        state
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::NotFound(format!("deployments.apps \"{}\" not found", name)))
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let mut state = self.lock();
        state.create_calls += 1;
        if let Some(error) = state.fail_next_create.take() {
            return Err(error);
        }
        let key = key_of(deployment);
        if state.deployments.contains_key(&key) {
            return Err(ClusterError::Conflict(format!(
                "deployments.apps \"{}\" already exists",
                key.1
            )));
        }
        state.next_resource_version += 1;
        let mut stored = deployment.clone();
        stored.metadata.resource_version = Some(state.next_resource_version.to_string());
        state.created.push(deployment.clone());
        state.deployments.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, ClusterError> {
        let mut state = self.lock();
        state.replace_calls += 1;
        if let Some(error) = state.fail_next_replace.take() {
            return Err(error);
        }
        let key = key_of(deployment);
        let current = state
            .deployments
            .get(&key)
            .ok_or_else(|| ClusterError::NotFound(format!("deployments.apps \"{}\" not found", key.1)))?;
        if current.metadata.resource_version != deployment.metadata.resource_version {
            return Err(ClusterError::Conflict(format!(
                "the object has been modified; please apply your changes to the latest version of deployments.apps \"{}\"",
                key.1
            )));
        }
        state.next_resource_version += 1;
        let mut stored = deployment.clone();
        stored.metadata.resource_version = Some(state.next_resource_version.to_string());
        state.replaced.push(deployment.clone());
        state.deployments.insert(key, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn deployment(namespace: &str, name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let client = MockDeploymentClient::new();
        let err = client.get_deployment("ns1", "demo-collector").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let client = MockDeploymentClient::new();
        let created = client.create_deployment(&deployment("ns1", "demo-collector")).await.unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let fetched = client.get_deployment("ns1", "demo-collector").await.unwrap();
        assert_eq!(fetched.metadata.resource_version.as_deref(), Some("1"));
        assert_eq!(client.created().len(), 1);
    }

    #[tokio::test]
    async fn test_create_existing_conflicts() {
        let client = MockDeploymentClient::new();
        client.add_deployment(deployment("ns1", "demo-collector"));
        let err = client.create_deployment(&deployment("ns1", "demo-collector")).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(client.created().is_empty());
    }

    #[tokio::test]
    async fn test_replace_with_stale_version_conflicts() {
        let client = MockDeploymentClient::new();
        let created = client.create_deployment(&deployment("ns1", "demo-collector")).await.unwrap();

        let mut stale = created.clone();
        stale.metadata.resource_version = Some("0".to_string());
        assert!(client.replace_deployment(&stale).await.unwrap_err().is_conflict());

        let replaced = client.replace_deployment(&created).await.unwrap();
        assert_eq!(replaced.metadata.resource_version.as_deref(), Some("2"));
        assert_eq!(client.replace_calls(), 2);
        assert_eq!(client.replaced().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let client = MockDeploymentClient::new();
        client.add_deployment(deployment("ns1", "demo-collector"));
        client.fail_next_get(ClusterError::InvalidRequest("boom".to_string()));

        assert!(matches!(
            client.get_deployment("ns1", "demo-collector").await,
            Err(ClusterError::InvalidRequest(_))
        ));
        assert!(client.get_deployment("ns1", "demo-collector").await.is_ok());
    }
}
