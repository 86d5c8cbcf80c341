//! Kubernetes resource watchers.
//!
//! Drives reconciliation with `kube_runtime::Controller`, which re-runs a pass
//! whenever an OpenTelemetryService or a Deployment it owns changes, and never
//! runs two passes for the same object at once.

use crate::error::ControllerError;
use crate::reconciler::{resource_key, Reconciler};
use crds::OpenTelemetryService;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::Api;
use kube_runtime::{controller::{Action, Config as ControllerConfig}, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

async fn reconcile(
    instance: Arc<OpenTelemetryService>,
    reconciler: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    let outcome = reconciler.reconcile(&instance).await?;
    debug!("OpenTelemetryService {}: {:?}", resource_key(&instance), outcome);
    Ok(Action::await_change())
}

fn error_policy(
    instance: Arc<OpenTelemetryService>,
    error: &ControllerError,
    reconciler: Arc<Reconciler>,
) -> Action {
    let delay = reconciler.retry_delay(&instance);
    error!(
        "Reconciliation failed for OpenTelemetryService {}: {} (retrying in {}s)",
        resource_key(&instance),
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Watches OpenTelemetryService resources and the Deployments they own.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    instance_api: Api<OpenTelemetryService>,
    deployment_api: Api<Deployment>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        instance_api: Api<OpenTelemetryService>,
        deployment_api: Api<Deployment>,
    ) -> Self {
        Self {
            reconciler,
            instance_api,
            deployment_api,
        }
    }

    /// Runs until the process receives SIGTERM or Ctrl-C.
    pub async fn watch_instances(&self) -> Result<(), ControllerError> {
        info!("Starting OpenTelemetryService watcher");

        // Debounce batches bursts of events for the same object
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(4);

        Controller::new(self.instance_api.clone(), watcher::Config::default())
            .owns(self.deployment_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, self.reconciler.clone())
            .for_each(|res| async move {
                match res {
                    Ok((object, _action)) => debug!("Reconciled {}", object),
                    Err(e) => error!("Controller error: {}", e),
                }
            })
            .await;

        info!("OpenTelemetryService watcher stopped");
        Ok(())
    }
}
