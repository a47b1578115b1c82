//! HyperConverged Custom Resource Definition
//!
//! The HyperConverged record is the single source of truth the operator
//! reconciles its operands from. It is read-only to the operand layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Affinity, ObjectReference, Toleration};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name used for the HyperConverged record when none is set
pub const HYPERCONVERGED_NAME: &str = "kubevirt-hyperconverged";

/// HyperConverged resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hco.kubevirt.io",
    version = "v1beta1",
    kind = "HyperConverged",
    plural = "hyperconvergeds",
    singular = "hyperconverged",
    shortname = "hco",
    namespaced,
    status = "HyperConvergedStatus",
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedSpec {
    /// Placement of infrastructure components (controllers, API servers)
    #[serde(default)]
    pub infra: HyperConvergedConfig,

    /// Placement of workload components (node agents)
    #[serde(default)]
    pub workloads: HyperConvergedConfig,

    /// Optional features exposed to the cluster admin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_gates: Option<HyperConvergedFeatureGates>,
}

/// Per-workload-class configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedConfig {
    /// Node placement for this class of components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
}

/// Scheduling constraints for a class of components
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
}

/// Feature gates that may be switched on by the cluster admin.
///
/// An unset gate is disabled.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct HyperConvergedFeatureGates {
    /// Allow attaching a data volume to a running VMI
    #[serde(rename = "hotplugVolumes", skip_serializing_if = "Option::is_none")]
    pub hotplug_volumes: Option<bool>,

    /// Allow the host-passthrough CPU mode
    #[serde(rename = "withHostPassthroughCPU", skip_serializing_if = "Option::is_none")]
    pub with_host_passthrough_cpu: Option<bool>,

    /// Allow the host-model CPU mode
    #[serde(rename = "withHostModelCPU", skip_serializing_if = "Option::is_none")]
    pub with_host_model_cpu: Option<bool>,

    /// Allow live migration of VMIs with SR-IOV interfaces
    #[serde(rename = "sriovLiveMigration", skip_serializing_if = "Option::is_none")]
    pub sriov_live_migration: Option<bool>,

    /// Enable Hyper-V strict host checking
    #[serde(rename = "hypervStrictCheck", skip_serializing_if = "Option::is_none")]
    pub hyperv_strict_check: Option<bool>,

    /// Allow assigning GPU and vGPU devices
    #[serde(rename = "gpu", skip_serializing_if = "Option::is_none")]
    pub gpu: Option<bool>,

    /// Allow assigning host devices
    #[serde(rename = "hostDevices", skip_serializing_if = "Option::is_none")]
    pub host_devices: Option<bool>,
}

impl HyperConvergedFeatureGates {
    pub fn is_hotplug_volumes_enabled(&self) -> bool {
        self.hotplug_volumes.unwrap_or(false)
    }

    pub fn is_with_host_passthrough_cpu_enabled(&self) -> bool {
        self.with_host_passthrough_cpu.unwrap_or(false)
    }

    pub fn is_with_host_model_cpu_enabled(&self) -> bool {
        self.with_host_model_cpu.unwrap_or(false)
    }

    pub fn is_sriov_live_migration_enabled(&self) -> bool {
        self.sriov_live_migration.unwrap_or(false)
    }

    pub fn is_hyperv_strict_check_enabled(&self) -> bool {
        self.hyperv_strict_check.unwrap_or(false)
    }

    pub fn is_gpu_assignment_enabled(&self) -> bool {
        self.gpu.unwrap_or(false)
    }

    pub fn is_host_devices_assignment_enabled(&self) -> bool {
        self.host_devices.unwrap_or(false)
    }
}

/// HyperConverged status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HyperConvergedStatus {
    /// Aggregated operand conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Operand objects managed on behalf of this record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_objects: Vec<ObjectReference>,

    /// Versions of the deployed components
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<Version>,

    /// Observed generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl HyperConvergedStatus {
    /// Version recorded for the named component
    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.version.as_str())
    }
}

/// A named component version
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Version {
    pub name: String,
    pub version: String,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
