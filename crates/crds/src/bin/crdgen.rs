//! Prints the CustomResourceDefinition manifests as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/opentelemetryservice.yaml`

use crds::OpenTelemetryService;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = OpenTelemetryService::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
