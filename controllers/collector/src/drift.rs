//! Drift detection between the desired and the existing Deployment.
//!
//! Only fields this controller sets are compared. Metadata maintained by the
//! cluster (resourceVersion, uid, timestamps, managed fields, status) and
//! fields the API server defaults (pull policy, termination message path,
//! volume default mode) are ignored. Labels and annotations are compared as
//! subsets so keys added by other actors, such as
//! `deployment.kubernetes.io/revision`, do not count as drift.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, Volume};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Names of the managed fields where `existing` differs from `desired`.
///
/// An empty result means the Deployment is in sync.
pub fn deployment_drift(desired: &Deployment, existing: &Deployment) -> Vec<&'static str> {
    let mut drift = Vec::new();

    if !is_subset(&desired.metadata.labels, &existing.metadata.labels) {
        drift.push("metadata.labels");
    }
    if !is_subset(&desired.metadata.annotations, &existing.metadata.annotations) {
        drift.push("metadata.annotations");
    }
    if !owner_references_present(&desired.metadata, &existing.metadata) {
        drift.push("metadata.ownerReferences");
    }

    let empty = DeploymentSpec::default();
    let desired_spec = desired.spec.as_ref().unwrap_or(&empty);
    let existing_spec = existing.spec.as_ref().unwrap_or(&empty);

    if desired_spec.replicas.is_some() && desired_spec.replicas != existing_spec.replicas {
        drift.push("spec.replicas");
    }
    if desired_spec.selector.match_labels != existing_spec.selector.match_labels {
        drift.push("spec.selector");
    }

    let desired_meta = desired_spec.template.metadata.as_ref();
    let existing_meta = existing_spec.template.metadata.as_ref();
    if !is_subset(
        &desired_meta.and_then(|m| m.labels.clone()),
        &existing_meta.and_then(|m| m.labels.clone()),
    ) {
        drift.push("spec.template.metadata.labels");
    }
    if !is_subset(
        &desired_meta.and_then(|m| m.annotations.clone()),
        &existing_meta.and_then(|m| m.annotations.clone()),
    ) {
        drift.push("spec.template.metadata.annotations");
    }

    let empty_pod = PodSpec::default();
    let desired_pod = desired_spec.template.spec.as_ref().unwrap_or(&empty_pod);
    let existing_pod = existing_spec.template.spec.as_ref().unwrap_or(&empty_pod);

    if !containers_match(&desired_pod.containers, &existing_pod.containers) {
        drift.push("spec.template.spec.containers");
    }
    if !volumes_match(
        desired_pod.volumes.as_deref().unwrap_or_default(),
        existing_pod.volumes.as_deref().unwrap_or_default(),
    ) {
        drift.push("spec.template.spec.volumes");
    }

    drift
}

/// `existing` with every managed field overwritten from `desired`.
///
/// Keys added to labels and annotations by other actors are kept, and the
/// existing resourceVersion is carried forward so the write is rejected if the
/// object changed since it was read. Owner references are merged by uid, so
/// references held by other owners survive. Whether another controller
/// reference is present is not checked here.
pub fn merge_desired(existing: &Deployment, desired: &Deployment) -> Deployment {
    let mut merged = existing.clone();

    extend(&mut merged.metadata.labels, &desired.metadata.labels);
    extend(&mut merged.metadata.annotations, &desired.metadata.annotations);
    merge_owner_references(&mut merged.metadata.owner_references, &desired.metadata.owner_references);
    merged.status = None;

    let Some(desired_spec) = desired.spec.as_ref() else {
        return merged;
    };
    let spec = merged.spec.get_or_insert_with(DeploymentSpec::default);

    if desired_spec.replicas.is_some() {
        spec.replicas = desired_spec.replicas;
    }
    spec.selector = desired_spec.selector.clone();

    if let Some(desired_meta) = desired_spec.template.metadata.as_ref() {
        let meta = spec.template.metadata.get_or_insert_with(ObjectMeta::default);
        extend(&mut meta.labels, &desired_meta.labels);
        extend(&mut meta.annotations, &desired_meta.annotations);
    }
    if let Some(desired_pod) = desired_spec.template.spec.as_ref() {
        let pod = spec.template.spec.get_or_insert_with(PodSpec::default);
        pod.containers = desired_pod.containers.clone();
        pod.volumes = desired_pod.volumes.clone();
    }

    merged
}

fn is_subset(
    desired: &Option<BTreeMap<String, String>>,
    existing: &Option<BTreeMap<String, String>>,
) -> bool {
    let Some(desired) = desired else {
        return true;
    };
    let empty = BTreeMap::new();
    let existing = existing.as_ref().unwrap_or(&empty);
    desired.iter().all(|(k, v)| existing.get(k) == Some(v))
}

fn extend(target: &mut Option<BTreeMap<String, String>>, source: &Option<BTreeMap<String, String>>) {
    if let Some(source) = source {
        target
            .get_or_insert_with(BTreeMap::new)
            .extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

fn merge_owner_references(target: &mut Option<Vec<OwnerReference>>, source: &Option<Vec<OwnerReference>>) {
    let Some(source) = source else {
        return;
    };
    let refs = target.get_or_insert_with(Vec::new);
    for wanted in source {
        match refs.iter_mut().find(|r| r.uid == wanted.uid) {
            Some(existing) => *existing = wanted.clone(),
            None => refs.push(wanted.clone()),
        }
    }
}

fn owner_references_present(desired: &ObjectMeta, existing: &ObjectMeta) -> bool {
    let existing_refs = existing.owner_references.as_deref().unwrap_or_default();
    desired
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .all(|wanted| {
            existing_refs
                .iter()
                .any(|r| r.uid == wanted.uid && r.controller == wanted.controller)
        })
}

fn containers_match(desired: &[Container], existing: &[Container]) -> bool {
    desired.len() == existing.len()
        && desired.iter().zip(existing).all(|(want, have)| {
            want.name == have.name
                && want.image == have.image
                && want.args == have.args
                && mounts(want) == mounts(have)
        })
}

fn mounts(container: &Container) -> Vec<(&str, &str)> {
    container
        .volume_mounts
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|m| (m.name.as_str(), m.mount_path.as_str()))
        .collect()
}

fn volumes_match(desired: &[Volume], existing: &[Volume]) -> bool {
    desired.len() == existing.len()
        && desired.iter().zip(existing).all(|(want, have)| {
            want.name == have.name
                && match (&want.config_map, &have.config_map) {
                    (Some(w), Some(h)) => {
                        w.name == h.name
                            && key_paths(w.items.as_deref()) == key_paths(h.items.as_deref())
                    }
                    (None, None) => true,
                    _ => false,
                }
        })
}

fn key_paths(items: Option<&[k8s_openapi::api::core::v1::KeyToPath]>) -> Vec<(&str, &str)> {
    items
        .unwrap_or_default()
        .iter()
        .map(|i| (i.key.as_str(), i.path.as_str()))
        .collect()
}
