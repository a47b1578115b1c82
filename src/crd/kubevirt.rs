//! Typed client view of the KubeVirt custom resource
//!
//! The CRD itself is installed by KubeVirt; only the fields the operator
//! reads or writes are modelled here. Every other field of the spec is kept
//! verbatim in the `extra` maps so it survives a read-modify-write.

use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodePlacement;

/// KubeVirt uninstall strategy that refuses removal while VMs exist
pub const UNINSTALL_BLOCK_IF_WORKLOADS_EXIST: &str = "BlockUninstallIfWorkloadsExist";

/// KubeVirt resource specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "KubeVirt",
    plural = "kubevirts",
    namespaced,
    status = "KubeVirtStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uninstall_strategy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub infra: Option<ComponentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workloads: Option<ComponentConfig>,

    #[serde(default)]
    pub configuration: KubeVirtConfiguration,

    /// Spec fields not modelled above
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_configuration: Option<DeveloperConfiguration>,

    #[serde(rename = "selinuxLauncherType", skip_serializing_if = "Option::is_none")]
    pub selinux_launcher_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfiguration>,

    #[serde(rename = "smbios", skip_serializing_if = "Option::is_none")]
    pub smbios: Option<SmbiosConfiguration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperConfiguration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_gates: Vec<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_emulation: bool,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_network_interface: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// SMBIOS values presented to guests
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SmbiosConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// KubeVirt status as reported by virt-operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<KubeVirtCondition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_kube_virt_version: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeVirtCondition {
    #[serde(rename = "type")]
    pub type_: String,

    pub status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
