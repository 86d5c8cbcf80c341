//! Desired state of the collector Deployment.
//!
//! Synthesis is pure: the same instance and configuration always produce the
//! same Deployment, and nothing here performs I/O.

use crate::config::{ConfigProvider, IMAGE_CONFIG_KEY};
use crate::diagnostics::DiagnosticSink;
use crate::labels::{common_labels, NAME_LABEL};
use crds::OpenTelemetryService;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, KeyToPath, PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// ConfigMap entry holding the collector configuration
pub const COLLECTOR_CONFIG_ENTRY: &str = "collector.yaml";

/// Name of the collector container
pub const CONTAINER_NAME: &str = "opentelemetry-service";

/// Where the configuration volume is mounted
pub const CONFIG_MOUNT_PATH: &str = "/conf";

/// Argument reserved for the mounted configuration file
pub const CONFIG_ARG: &str = "config";

/// Scrape annotations forced onto every collector pod
pub const SCRAPE_ANNOTATIONS: [(&str, &str); 3] = [
    ("prometheus.io/scrape", "true"),
    ("prometheus.io/port", "8888"),
    ("prometheus.io/path", "/metrics"),
];

/// Name of the Deployment (and its ConfigMap volume) for an instance name
pub fn collector_name(instance_name: &str) -> String {
    format!("{}-collector", instance_name)
}

/// Path of the collector configuration inside the container
pub fn config_file_path() -> String {
    format!("{}/{}", CONFIG_MOUNT_PATH, COLLECTOR_CONFIG_ENTRY)
}

/// Builds the Deployment that should exist for `instance`.
///
/// The image falls back to `config`'s `otelsvc-image` when the instance does
/// not request one; an empty image is passed through for the API server to
/// reject. A user-supplied `config` argument is reported to `diagnostics` and
/// replaced.
pub fn desired_deployment(
    instance: &OpenTelemetryService,
    config: &dyn ConfigProvider,
    diagnostics: &dyn DiagnosticSink,
) -> Deployment {
    let instance_name = instance.metadata.name.as_deref().unwrap_or_default();
    let namespace = instance.metadata.namespace.clone();
    let name = collector_name(instance_name);

    let image = match instance.spec.requested_image() {
        Some(image) => image.to_string(),
        None => config.get_string(IMAGE_CONFIG_KEY),
    };

    let mut labels = common_labels(instance);
    labels.insert(NAME_LABEL.to_string(), name.clone());

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace,
            labels: Some(labels.clone()),
            annotations: instance.metadata.annotations.clone(),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: instance.spec.replicas,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(pod_annotations(instance)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(image),
                        args: Some(collector_args(instance, diagnostics)),
                        volume_mounts: Some(vec![VolumeMount {
                            name: name.clone(),
                            mount_path: CONFIG_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: name.clone(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: name.into(),
                            items: Some(vec![KeyToPath {
                                key: COLLECTOR_CONFIG_ENTRY.to_string(),
                                path: COLLECTOR_CONFIG_ENTRY.to_string(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Instance annotations plus the scrape annotations, which always win.
fn pod_annotations(instance: &OpenTelemetryService) -> BTreeMap<String, String> {
    let mut annotations = instance.metadata.annotations.clone().unwrap_or_default();
    for (key, value) in SCRAPE_ANNOTATIONS {
        annotations.insert(key.to_string(), value.to_string());
    }
    annotations
}

/// Instance arguments as `--key=value`, sorted by key, with `config` forced.
fn collector_args(instance: &OpenTelemetryService, diagnostics: &dyn DiagnosticSink) -> Vec<String> {
    let mut args = instance.spec.args.clone().unwrap_or_default();

    if args.contains_key(CONFIG_ARG) {
        diagnostics.warning(
            instance.metadata.namespace.as_deref().unwrap_or_default(),
            instance.metadata.name.as_deref().unwrap_or_default(),
            "the 'config' flag isn't allowed and is being ignored",
        );
    }
    args.insert(CONFIG_ARG.to_string(), config_file_path());

    args.iter()
        .map(|(key, value)| format!("--{}={}", key, value))
        .collect()
}
