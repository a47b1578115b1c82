//! Custom Resource Definitions used by the HyperConverged operator

mod hyperconverged;
mod kubevirt;

pub use hyperconverged::*;
pub use kubevirt::*;

use kube::CustomResourceExt;

/// Generate the CRD YAML manifests owned by this operator.
///
/// KubeVirt ships its own CRD, so only HyperConverged is emitted.
pub fn generate_crds() -> Result<Vec<String>, serde_yaml::Error> {
    Ok(vec![serde_yaml::to_string(&HyperConverged::crd())?])
}
