//! Labels shared by every resource managed for an instance.

use crds::OpenTelemetryService;
use std::collections::BTreeMap;

/// Label naming the individual resource
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Labels common to all resources belonging to `instance`.
///
/// Derived only from the instance identity, so the same instance always yields
/// the same set.
pub fn common_labels(instance: &OpenTelemetryService) -> BTreeMap<String, String> {
    let name = instance.metadata.name.as_deref().unwrap_or_default();
    let namespace = instance.metadata.namespace.as_deref().unwrap_or_default();

    BTreeMap::from([
        ("app.kubernetes.io/managed-by".to_string(), "opentelemetry-operator".to_string()),
        ("app.kubernetes.io/instance".to_string(), format!("{}.{}", namespace, name)),
        ("app.kubernetes.io/part-of".to_string(), "opentelemetry".to_string()),
        ("app.kubernetes.io/component".to_string(), "opentelemetry-collector".to_string()),
    ])
}
