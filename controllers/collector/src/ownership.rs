//! Owner references from managed children back to their instance.

use crate::error::ControllerError;
use crds::OpenTelemetryService;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

/// Marks `owner` as the controller of the object described by `child`.
///
/// An existing reference to the same owner is replaced; a reference to a
/// different controller is an error, as Kubernetes allows only one.
pub fn set_controller_reference(
    owner: &OpenTelemetryService,
    child: &mut ObjectMeta,
) -> Result<(), ControllerError> {
    let owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::Ownership(format!(
            "OpenTelemetryService {}/{} has no name or uid",
            owner.metadata.namespace.as_deref().unwrap_or_default(),
            owner.metadata.name.as_deref().unwrap_or_default(),
        ))
    })?;

    let refs = child.owner_references.get_or_insert_with(Vec::new);

    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && r.uid != owner_ref.uid)
    {
        return Err(ControllerError::Ownership(format!(
            "already controlled by {} {}",
            other.kind, other.name
        )));
    }

    refs.retain(|r| r.uid != owner_ref.uid);
    refs.push(owner_ref);
    Ok(())
}
