//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the Kubernetes
//! client, the reconciler and the watcher together.

use crate::config::{ControllerConfig, EnvConfigProvider};
use crate::diagnostics::TracingSink;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use cluster_client::KubeDeploymentClient;
use crds::OpenTelemetryService;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for OpenTelemetry collector Deployments.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing OpenTelemetry Collector Controller");

        let kube_client = Client::try_default().await?;

        let deployment_client = KubeDeploymentClient::new(kube_client.clone())
            .with_timeout(config.api_timeout);

        let reconciler = Arc::new(Reconciler::new(
            Arc::new(deployment_client),
            Arc::new(EnvConfigProvider),
            Arc::new(TracingSink),
            config.drift_policy,
        ));

        let (instance_api, deployment_api): (Api<OpenTelemetryService>, Api<Deployment>) =
            match config.namespace.as_deref() {
                Some(ns) => (
                    Api::namespaced(kube_client.clone(), ns),
                    Api::namespaced(kube_client, ns),
                ),
                None => (Api::all(kube_client.clone()), Api::all(kube_client)),
            };

        let watcher_instance = Watcher::new(reconciler, instance_api, deployment_api);
        let watcher = tokio::spawn(async move {
            watcher_instance.watch_instances().await
        });

        Ok(Self { watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("OpenTelemetry Collector Controller running");

        self.watcher
            .await
            .map_err(|e| ControllerError::Watch(format!("OpenTelemetryService watcher panicked: {}", e)))??;

        info!("OpenTelemetry Collector Controller stopped");
        Ok(())
    }
}
