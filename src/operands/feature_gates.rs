//! KubeVirt feature-gate resolution
//!
//! The gate list handed to KubeVirt is the fixed set the operator always
//! enables followed by the admin-selectable gates that are switched on.

use crate::crd::HyperConvergedFeatureGates;

/// Gates always enabled and not exposed to the admin.
pub const HARDCODED_GATES: &[&str] = &[
    "DataVolumes",
    "SRIOV",
    "LiveMigration",
    "CPUManager",
    "CPUNodeDiscovery",
    "Sidecar",
    "Snapshot",
];

pub const HOTPLUG_VOLUMES_GATE: &str = "HotplugVolumes";
pub const WITH_HOST_PASSTHROUGH_CPU_GATE: &str = "WithHostPassthroughCPU";
pub const WITH_HOST_MODEL_CPU_GATE: &str = "WithHostModelCPU";
pub const SRIOV_LIVE_MIGRATION_GATE: &str = "SRIOVLiveMigration";
pub const HYPERV_STRICT_CHECK_GATE: &str = "HypervStrictCheck";
pub const GPU_GATE: &str = "GPU";
pub const HOST_DEVICES_GATE: &str = "HostDevices";

type GateCheck = fn(&HyperConvergedFeatureGates) -> bool;

/// Admin-selectable gates, in the order they are appended.
pub const CONDITIONAL_GATES: &[(&str, GateCheck)] = &[
    (HOTPLUG_VOLUMES_GATE, HyperConvergedFeatureGates::is_hotplug_volumes_enabled),
    (
        WITH_HOST_PASSTHROUGH_CPU_GATE,
        HyperConvergedFeatureGates::is_with_host_passthrough_cpu_enabled,
    ),
    (WITH_HOST_MODEL_CPU_GATE, HyperConvergedFeatureGates::is_with_host_model_cpu_enabled),
    (SRIOV_LIVE_MIGRATION_GATE, HyperConvergedFeatureGates::is_sriov_live_migration_enabled),
    (HYPERV_STRICT_CHECK_GATE, HyperConvergedFeatureGates::is_hyperv_strict_check_enabled),
    (GPU_GATE, HyperConvergedFeatureGates::is_gpu_assignment_enabled),
    (HOST_DEVICES_GATE, HyperConvergedFeatureGates::is_host_devices_assignment_enabled),
];

/// Conditional gates switched on in `gates`. A missing gate block enables none.
pub fn enabled_conditional_gates(gates: Option<&HyperConvergedFeatureGates>) -> Vec<&'static str> {
    let Some(gates) = gates else {
        return Vec::new();
    };
    CONDITIONAL_GATES
        .iter()
        .filter(|(_, enabled)| enabled(gates))
        .map(|(name, _)| *name)
        .collect()
}

/// Full gate list: hard-coded gates first, then the enabled conditional ones.
pub fn kubevirt_feature_gates(gates: Option<&HyperConvergedFeatureGates>) -> Vec<String> {
    HARDCODED_GATES
        .iter()
        .copied()
        .chain(enabled_conditional_gates(gates))
        .map(str::to_string)
        .collect()
}

/// Gate list as stored in the KubeVirt config map
pub fn feature_gates_string(gates: Option<&HyperConvergedFeatureGates>) -> String {
    kubevirt_feature_gates(gates).join(",")
}
