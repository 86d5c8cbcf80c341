//! OpenTelemetryService CRD
//!
//! Declares the desired deployment of an OpenTelemetry collector.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// API group of the `OpenTelemetryService` resource
pub const API_GROUP: &str = "opentelemetry.io";

/// API version of the `OpenTelemetryService` resource
pub const API_VERSION: &str = "v1alpha1";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "opentelemetry.io",
    version = "v1alpha1",
    kind = "OpenTelemetryService",
    shortname = "otelsvc",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryServiceSpec {
    /// Collector container image (falls back to the operator's default image when empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Number of collector replicas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Extra command-line arguments, rendered as `--key=value`.
    ///
    /// The `config` key is reserved: the collector is always pointed at the
    /// mounted configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<BTreeMap<String, String>>,

    /// Collector configuration (YAML).
    ///
    /// Rendered into the `<name>-collector` ConfigMap by the ConfigMap
    /// reconciler. The collector controller does not read it; it only mounts
    /// that ConfigMap by name at `/conf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl OpenTelemetryServiceSpec {
    /// Image requested by the user, ignoring empty strings
    pub fn requested_image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }
}
