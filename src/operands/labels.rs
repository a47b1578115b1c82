//! Standard labels stamped on every operand object

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::config::OperandEnv;
use crate::crd::{HyperConverged, HYPERCONVERGED_NAME};

pub const APP_LABEL: &str = "app";
pub const APP_LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const APP_LABEL_VERSION: &str = "app.kubernetes.io/version";
pub const APP_LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const APP_LABEL_COMPONENT: &str = "app.kubernetes.io/component";

pub const OPERATOR_NAME: &str = "hco-operator";
pub const HYPERCONVERGED_CLUSTER: &str = "hyperconverged-cluster";

/// Component classes operands belong to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppComponent {
    Compute,
}

impl AppComponent {
    pub fn as_str(self) -> &'static str {
        match self {
            AppComponent::Compute => "compute",
        }
    }
}

/// Ownership labels for an operand of the given parent record
pub fn operand_labels(
    hc: &HyperConverged,
    env: &OperandEnv,
    component: AppComponent,
) -> BTreeMap<String, String> {
    let hc_name = match hc.name_any() {
        name if name.is_empty() => HYPERCONVERGED_NAME.to_string(),
        name => name,
    };

    let mut labels = BTreeMap::from([
        (APP_LABEL.to_string(), hc_name),
        (APP_LABEL_MANAGED_BY.to_string(), OPERATOR_NAME.to_string()),
        (APP_LABEL_PART_OF.to_string(), HYPERCONVERGED_CLUSTER.to_string()),
        (APP_LABEL_COMPONENT.to_string(), component.as_str().to_string()),
    ]);
    if let Some(version) = crate::config::non_blank(env.operator_version.as_deref()) {
        labels.insert(APP_LABEL_VERSION.to_string(), version.to_string());
    }
    labels
}

/// Label selector matching every object managed by this operator
pub fn managed_by_selector() -> String {
    format!("{APP_LABEL_MANAGED_BY}={OPERATOR_NAME}")
}
