//! Reconciliation logic for OpenTelemetryService CRDs.
//!
//! One pass synthesizes the desired Deployment, attaches the owner reference,
//! reads the existing Deployment once and writes at most once:
//! - absent: create it
//! - present: compare, and replace only under [`DriftPolicy::Replace`]
//! - any other read failure: return it without writing
//!
//! Nothing here retries. Failed passes are requeued by the watcher.

use crate::backoff::BackoffTracker;
use crate::config::{ConfigProvider, DriftPolicy};
use crate::deployment::{collector_name, desired_deployment};
use crate::diagnostics::DiagnosticSink;
use crate::drift::{deployment_drift, merge_desired};
use crate::error::ControllerError;
use crate::object_state::ObjectStates;
use crate::ownership::set_controller_reference;
use cluster_client::{ClusterError, DeploymentClient};
use crds::OpenTelemetryService;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of a successful reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The Deployment did not exist and was created
    Created,
    /// The Deployment exists and matches the desired state
    InSync,
    /// The Deployment differs in the listed fields but was left alone
    DriftObserved(Vec<&'static str>),
    /// The Deployment differed in the listed fields and was replaced
    Updated(Vec<&'static str>),
}

/// Runs one reconciliation pass of the collector Deployment for `instance`.
pub async fn reconcile_deployment(
    instance: &OpenTelemetryService,
    client: &dyn DeploymentClient,
    config: &dyn ConfigProvider,
    diagnostics: &dyn DiagnosticSink,
    drift_policy: DriftPolicy,
) -> Result<ReconcileOutcome, ControllerError> {
    let mut desired = desired_deployment(instance, config, diagnostics);
    set_controller_reference(instance, &mut desired.metadata)?;

    let namespace = desired.metadata.namespace.clone().unwrap_or_default();
    let name = desired.metadata.name.clone().unwrap_or_default();

    let existing = match client.get_deployment(&namespace, &name).await {
        Ok(existing) => existing,
        Err(ClusterError::NotFound(_)) => {
            info!("Creating Deployment {}/{}", namespace, name);
            client
                .create_deployment(&desired)
                .await
                .map_err(|source| ControllerError::Create {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    source,
                })?;
            info!("Created Deployment {}/{}", namespace, name);
            return Ok(ReconcileOutcome::Created);
        }
        Err(source) => {
            return Err(ControllerError::Fetch { namespace, name, source });
        }
    };

    let drift = deployment_drift(&desired, &existing);
    if drift.is_empty() {
        debug!("Deployment {}/{} is in sync", namespace, name);
        return Ok(ReconcileOutcome::InSync);
    }

    match drift_policy {
        DriftPolicy::Observe => {
            debug!(
                "Deployment {}/{} differs from desired state in {:?}; leaving it unchanged",
                namespace, name, drift
            );
            Ok(ReconcileOutcome::DriftObserved(drift))
        }
        DriftPolicy::Replace => {
            // Never take over a Deployment another object controls
            set_controller_reference(instance, &mut existing.metadata.clone())?;

            info!("Deployment {}/{} drifted in {:?}, updating", namespace, name, drift);
            let merged = merge_desired(&existing, &desired);
            client
                .replace_deployment(&merged)
                .await
                .map_err(|source| ControllerError::Update {
                    namespace: namespace.clone(),
                    name: name.clone(),
                    source,
                })?;
            info!("Updated Deployment {}/{}", namespace, name);
            Ok(ReconcileOutcome::Updated(drift))
        }
    }
}

/// Drift reports of objects not reconciled for this long are forgotten, so
/// the next pass reports their drift again.
const DRIFT_REPORT_TTL: Duration = Duration::from_secs(60 * 60);

/// Reconciler shared by the watcher: collaborators plus per-object backoff.
pub struct Reconciler {
    client: Arc<dyn DeploymentClient>,
    config: Arc<dyn ConfigProvider>,
    diagnostics: Arc<dyn DiagnosticSink>,
    drift_policy: DriftPolicy,
    backoff: BackoffTracker,
    /// Drifted fields last reported per object
    reported_drift: ObjectStates<Vec<&'static str>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("drift_policy", &self.drift_policy)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Arc<dyn DeploymentClient>,
        config: Arc<dyn ConfigProvider>,
        diagnostics: Arc<dyn DiagnosticSink>,
        drift_policy: DriftPolicy,
    ) -> Self {
        Self {
            client,
            config,
            diagnostics,
            drift_policy,
            backoff: BackoffTracker::default(),
            reported_drift: ObjectStates::new(DRIFT_REPORT_TTL),
        }
    }

    /// Reconciles the collector Deployment of an OpenTelemetryService.
    ///
    /// Resets the object's backoff on success. Observed drift is reported to
    /// the diagnostic sink only when the set of drifted fields changes, since
    /// every status update of the owned Deployment triggers a pass.
    pub async fn reconcile(&self, instance: &OpenTelemetryService) -> Result<ReconcileOutcome, ControllerError> {
        let key = resource_key(instance);
        info!("Reconciling OpenTelemetryService {}", key);

        let outcome = reconcile_deployment(
            instance,
            self.client.as_ref(),
            self.config.as_ref(),
            self.diagnostics.as_ref(),
            self.drift_policy,
        )
        .await?;

        self.backoff.reset(&key);
        match &outcome {
            ReconcileOutcome::DriftObserved(fields) => self.report_drift(instance, &key, fields),
            _ => self.reported_drift.remove(&key),
        }
        Ok(outcome)
    }

    fn report_drift(&self, instance: &OpenTelemetryService, key: &str, fields: &[&'static str]) {
        let changed = self.reported_drift.with(key, Instant::now(), |reported| {
            if reported.as_slice() == fields {
                false
            } else {
                *reported = fields.to_vec();
                true
            }
        });
        if changed {
            let namespace = instance.metadata.namespace.as_deref().unwrap_or_default();
            let name = instance.metadata.name.as_deref().unwrap_or_default();
            self.diagnostics.warning(
                namespace,
                name,
                &format!(
                    "Deployment {} differs from desired state in {:?}; leaving it unchanged (drift policy: observe)",
                    collector_name(name),
                    fields
                ),
            );
        }
    }

    /// Delay before retrying a failed object; grows with consecutive failures
    pub fn retry_delay(&self, instance: &OpenTelemetryService) -> Duration {
        self.backoff.next_delay(&resource_key(instance))
    }
}

/// `namespace/name` of an instance
pub fn resource_key(instance: &OpenTelemetryService) -> String {
    format!(
        "{}/{}",
        instance.metadata.namespace.as_deref().unwrap_or_default(),
        instance.metadata.name.as_deref().unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StaticConfigProvider, IMAGE_CONFIG_KEY};
    use crate::diagnostics::RecordingSink;
    use cluster_client::MockDeploymentClient;
    use crds::OpenTelemetryServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    fn instance() -> OpenTelemetryService {
        OpenTelemetryService {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("ns1".to_string()),
                uid: Some("uid-demo".to_string()),
                ..Default::default()
            },
            spec: OpenTelemetryServiceSpec {
                replicas: Some(1),
                args: Some(BTreeMap::from([("log-level".to_string(), "debug".to_string())])),
                ..Default::default()
            },
        }
    }

    fn config() -> StaticConfigProvider {
        StaticConfigProvider::new().with(IMAGE_CONFIG_KEY, "otel/collector:latest")
    }

    async fn run(
        client: &MockDeploymentClient,
        instance: &OpenTelemetryService,
        policy: DriftPolicy,
    ) -> Result<ReconcileOutcome, ControllerError> {
        reconcile_deployment(instance, client, &config(), &RecordingSink::default(), policy).await
    }

    #[tokio::test]
    async fn test_not_found_creates_once_with_owner_reference() {
        let client = MockDeploymentClient::new();
        let instance = instance();

        let outcome = run(&client, &instance, DriftPolicy::Observe).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Created);
        assert_eq!(client.get_calls(), 1);
        assert_eq!(client.create_calls(), 1);

        let mut expected = desired_deployment(&instance, &config(), &RecordingSink::default());
        set_controller_reference(&instance, &mut expected.metadata).unwrap();
        let created = client.created();
        assert_eq!(created, vec![expected]);
        let refs = created[0].metadata.owner_references.clone().unwrap();
        assert_eq!(refs[0].uid, "uid-demo");
    }

    #[tokio::test]
    async fn test_found_does_not_create() {
        let client = MockDeploymentClient::new();
        let instance = instance();
        run(&client, &instance, DriftPolicy::Observe).await.unwrap();

        let outcome = run(&client, &instance, DriftPolicy::Observe).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::InSync);
        assert_eq!(client.create_calls(), 1);
        assert_eq!(client.replace_calls(), 0);
    }

    #[tokio::test]
    async fn test_found_with_drift_is_left_alone_by_default() {
        let client = MockDeploymentClient::new();
        let mut existing = desired_deployment(&instance(), &config(), &RecordingSink::default());
        existing.spec.as_mut().unwrap().replicas = Some(7);
        existing.metadata.resource_version = Some("9".to_string());
        client.add_deployment(existing);

        let outcome = run(&client, &instance(), DriftPolicy::Observe).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::DriftObserved(ref fields) if fields.contains(&"spec.replicas")));
        assert_eq!(client.create_calls(), 0);
        assert_eq!(client.replace_calls(), 0);
        assert_eq!(client.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_found_with_drift_is_replaced_under_replace_policy() {
        let client = MockDeploymentClient::new();
        let mut existing = desired_deployment(&instance(), &config(), &RecordingSink::default());
        existing.spec.as_mut().unwrap().replicas = Some(7);
        existing.metadata.resource_version = Some("9".to_string());
        client.add_deployment(existing);

        let outcome = run(&client, &instance(), DriftPolicy::Replace).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        assert_eq!(client.create_calls(), 0);
        let replaced = client.replaced();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].metadata.resource_version.as_deref(), Some("9"));
        assert_eq!(replaced[0].spec.as_ref().unwrap().replicas, Some(1));

        // converged: the next pass writes nothing
        let outcome = run(&client, &instance(), DriftPolicy::Replace).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::InSync);
        assert_eq!(client.replace_calls(), 1);
    }

    #[tokio::test]
    async fn test_other_fetch_error_aborts_without_create() {
        let client = MockDeploymentClient::new();
        client.fail_next_get(ClusterError::Timeout {
            operation: "get deployment",
            after: Duration::from_secs(30),
        });

        let err = run(&client, &instance(), DriftPolicy::Observe).await.unwrap_err();

        match err {
            ControllerError::Fetch { namespace, name, source } => {
                assert_eq!(namespace, "ns1");
                assert_eq!(name, "demo-collector");
                assert!(matches!(source, ClusterError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_conflict_is_propagated() {
        let client = MockDeploymentClient::new();
        client.fail_next_create(ClusterError::Conflict("already exists".to_string()));

        let err = run(&client, &instance(), DriftPolicy::Observe).await.unwrap_err();

        assert!(matches!(err, ControllerError::Create { ref source, .. } if source.is_conflict()));
        assert_eq!(client.create_calls(), 1);
        assert!(client.created().is_empty());
    }

    #[tokio::test]
    async fn test_update_conflict_is_propagated() {
        let client = MockDeploymentClient::new();
        let mut existing = desired_deployment(&instance(), &config(), &RecordingSink::default());
        existing.spec.as_mut().unwrap().replicas = Some(7);
        existing.metadata.resource_version = Some("9".to_string());
        client.add_deployment(existing);
        client.fail_next_replace(ClusterError::Conflict("modified".to_string()));

        let err = run(&client, &instance(), DriftPolicy::Replace).await.unwrap_err();

        assert!(matches!(err, ControllerError::Update { ref source, .. } if source.is_conflict()));
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_owner_without_uid_fails_before_any_call() {
        let client = MockDeploymentClient::new();
        let mut instance = instance();
        instance.metadata.uid = None;

        let err = run(&client, &instance, DriftPolicy::Observe).await.unwrap_err();

        assert!(matches!(err, ControllerError::Ownership(_)));
        assert_eq!(client.get_calls(), 0);
        assert_eq!(client.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_reconciler_resets_backoff_on_success() {
        let client = MockDeploymentClient::new();
        let reconciler = Reconciler::new(
            Arc::new(client.clone()),
            Arc::new(config()),
            Arc::new(RecordingSink::default()),
            DriftPolicy::Observe,
        );
        let instance = instance();

        client.fail_next_get(ClusterError::InvalidRequest("boom".to_string()));
        assert!(reconciler.reconcile(&instance).await.is_err());
        assert_eq!(reconciler.retry_delay(&instance), Duration::from_secs(60));
        assert_eq!(reconciler.retry_delay(&instance), Duration::from_secs(60));
        assert_eq!(reconciler.retry_delay(&instance), Duration::from_secs(120));

        assert_eq!(reconciler.reconcile(&instance).await.unwrap(), ReconcileOutcome::Created);
        assert_eq!(reconciler.retry_delay(&instance), Duration::from_secs(60));
    }

    fn owner_ref(uid: &str, controller: Option<bool>) -> OwnerReference {
        OwnerReference {
            api_version: "opentelemetry.io/v1alpha1".to_string(),
            kind: "OpenTelemetryService".to_string(),
            name: uid.to_string(),
            uid: uid.to_string(),
            controller,
            block_owner_deletion: None,
        }
    }

    fn drifted_existing(owner_references: Vec<OwnerReference>) -> k8s_openapi::api::apps::v1::Deployment {
        let mut existing = desired_deployment(&instance(), &config(), &RecordingSink::default());
        existing.spec.as_mut().unwrap().replicas = Some(7);
        existing.metadata.resource_version = Some("9".to_string());
        existing.metadata.owner_references = Some(owner_references);
        existing
    }

    #[tokio::test]
    async fn test_replace_refuses_deployment_controlled_by_another_owner() {
        let client = MockDeploymentClient::new();
        let refs = vec![owner_ref("uid-other", Some(true)), owner_ref("uid-team", None)];
        client.add_deployment(drifted_existing(refs.clone()));

        let err = run(&client, &instance(), DriftPolicy::Replace).await.unwrap_err();

        assert!(matches!(err, ControllerError::Ownership(_)));
        assert_eq!(client.replace_calls(), 0);
        assert_eq!(client.create_calls(), 0);
        let stored = client.deployment("ns1", "demo-collector").unwrap();
        assert_eq!(stored.metadata.owner_references, Some(refs));
    }

    #[tokio::test]
    async fn test_replace_keeps_unrelated_owner_references() {
        let client = MockDeploymentClient::new();
        client.add_deployment(drifted_existing(vec![owner_ref("uid-team", None)]));

        let outcome = run(&client, &instance(), DriftPolicy::Replace).await.unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        let refs: Vec<_> = client.replaced()[0]
            .metadata
            .owner_references
            .clone()
            .unwrap()
            .into_iter()
            .map(|r| (r.uid, r.controller))
            .collect();
        assert_eq!(
            refs,
            vec![
                ("uid-team".to_string(), None),
                ("uid-demo".to_string(), Some(true)),
            ]
        );
    }

    #[tokio::test]
    async fn test_observed_drift_is_reported_once_per_change() {
        let client = MockDeploymentClient::new();
        let sink = Arc::new(RecordingSink::default());
        let reconciler = Reconciler::new(
            Arc::new(client.clone()),
            Arc::new(config()),
            sink.clone(),
            DriftPolicy::Observe,
        );
        let instance = instance();
        client.add_deployment(drifted_existing(Vec::new()));

        reconciler.reconcile(&instance).await.unwrap();
        reconciler.reconcile(&instance).await.unwrap();
        assert_eq!(sink.warnings().len(), 1);
        assert!(sink.warnings()[0].starts_with("ns1/demo: Deployment demo-collector differs"));
        assert!(sink.warnings()[0].contains("spec.replicas"));

        let mut changed = client.deployment("ns1", "demo-collector").unwrap();
        changed.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers[0].image =
            Some("old:1".to_string());
        client.add_deployment(changed);
        reconciler.reconcile(&instance).await.unwrap();
        reconciler.reconcile(&instance).await.unwrap();

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[1].contains("spec.template.spec.containers"));
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(resource_key(&instance()), "ns1/demo");
    }
}
