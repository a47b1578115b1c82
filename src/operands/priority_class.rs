//! Priority class for KubeVirt core components
//!
//! The value and description of a PriorityClass cannot be changed in place,
//! so any drift is corrected by deleting and recreating the object.

use async_trait::async_trait;
use k8s_openapi::api::scheduling::v1::PriorityClass;
use kube::{api::ObjectMeta, ResourceExt};
use tracing::info;

use crate::client::ClusterClient;
use crate::config::OperandEnv;
use crate::crd::HyperConverged;
use crate::error::Result;

use super::labels::{operand_labels, AppComponent};
use super::{OperandDescriptor, OperandHooks, OperandRequest, UpdateOutcome};

pub const KUBEVIRT_PRIORITY_CLASS_NAME: &str = "kubevirt-cluster-critical";

/// Highest value a user-defined priority class may carry
pub const KUBEVIRT_PRIORITY_CLASS_VALUE: i32 = 1_000_000_000;

pub const KUBEVIRT_PRIORITY_CLASS_DESCRIPTION: &str =
    "This priority class should be used for KubeVirt core components only.";

pub struct KvPriorityClassHooks;

#[async_trait]
impl OperandHooks for KvPriorityClassHooks {
    type Object = PriorityClass;

    const DESCRIPTOR: OperandDescriptor = OperandDescriptor {
        kind: "KubeVirtPriorityClass",
        is_cr: false,
        remove_existing_owner: false,
        set_controller_reference: false,
    };

    fn full_cr(&self, req: &mut OperandRequest<'_>) -> Result<PriorityClass> {
        Ok(new_kubevirt_priority_class(req.instance, req.env))
    }

    async fn update_cr<C: ClusterClient>(
        &self,
        req: &OperandRequest<'_>,
        client: &C,
        found: &PriorityClass,
        desired: &PriorityClass,
    ) -> Result<UpdateOutcome> {
        if !priority_class_differs(found, desired) {
            return Ok(UpdateOutcome::Unchanged);
        }

        if req.hco_triggered {
            info!(name = %found.name_any(), "Updating existing KubeVirt priority class to new opinionated values");
        } else {
            info!(name = %found.name_any(), "Reconciling an externally updated KubeVirt priority class to its opinionated values");
        }

        // A failure after the delete leaves the class absent; the next pass
        // takes the create path.
        client.delete(found).await?;
        client.create(desired).await?;

        Ok(UpdateOutcome::changed_by(req.hco_triggered))
    }
}

/// Build the desired KubeVirt priority class
pub fn new_kubevirt_priority_class(hc: &HyperConverged, env: &OperandEnv) -> PriorityClass {
    PriorityClass {
        metadata: ObjectMeta {
            name: Some(KUBEVIRT_PRIORITY_CLASS_NAME.to_string()),
            labels: Some(operand_labels(hc, env, AppComponent::Compute)),
            ..Default::default()
        },
        value: KUBEVIRT_PRIORITY_CLASS_VALUE,
        global_default: Some(false),
        description: Some(KUBEVIRT_PRIORITY_CLASS_DESCRIPTION.to_string()),
        ..Default::default()
    }
}

/// Compares only the fields this operator owns
fn priority_class_differs(found: &PriorityClass, desired: &PriorityClass) -> bool {
    found.metadata.name != desired.metadata.name
        || found.value != desired.value
        || found.description != desired.description
        || found.metadata.labels != desired.metadata.labels
}
