//! OpenTelemetry Collector Controller
//!
//! Reconciles `OpenTelemetryService` CRDs into collector Deployments.
//!
//! For each instance the controller derives a `<name>-collector` Deployment,
//! creates it when absent and checks it for drift when present.

mod backoff;
mod config;
mod controller;
mod deployment;
mod diagnostics;
mod drift;
mod error;
mod labels;
mod object_state;
mod ownership;
mod reconciler;
mod watcher;

use crate::config::{ConfigProvider, ControllerConfig, EnvConfigProvider, IMAGE_CONFIG_KEY, env_key};
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls transport needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting OpenTelemetry Collector Controller");

    let config = ControllerConfig::from_env()?;
    let default_image = EnvConfigProvider.get_string(IMAGE_CONFIG_KEY);

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Drift policy: {}", config.drift_policy);
    info!("  API timeout: {}s", config.api_timeout.as_secs());
    if default_image.is_empty() {
        warn!(
            "  Default image: <unset> ({} not set; instances must specify spec.image)",
            env_key(IMAGE_CONFIG_KEY)
        );
    } else {
        info!("  Default image: {}", default_image);
    }

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
