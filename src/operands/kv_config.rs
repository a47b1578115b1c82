//! KubeVirt config map operand
//!
//! Only the feature-gate key is reconciled continuously. The keys seeded from
//! the environment are forced back to their defaults during an operator
//! upgrade and left to the admin otherwise.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::ObjectMeta, ResourceExt};
use tracing::{error, info};

use crate::client::ClusterClient;
use crate::config::{non_blank, OperandEnv};
use crate::crd::HyperConverged;
use crate::error::Result;

use super::feature_gates::feature_gates_string;
use super::kubevirt::SELINUX_LAUNCHER_TYPE;
use super::labels::{operand_labels, AppComponent};
use super::{OperandDescriptor, OperandHooks, OperandRequest, UpdateOutcome};

pub const KUBEVIRT_CONFIG_NAME: &str = "kubevirt-config";

pub const FEATURE_GATES_KEY: &str = "feature-gates";
pub const MACHINE_TYPE_KEY: &str = "machine-type";
pub const USE_EMULATION_KEY: &str = "debug.useEmulation";
pub const MIGRATIONS_CONFIG_KEY: &str = "migrations";
pub const NETWORK_INTERFACE_KEY: &str = "default-network-interface";
pub const SMBIOS_CONFIG_KEY: &str = "smbios";
pub const SELINUX_LAUNCHER_TYPE_KEY: &str = "selinuxLauncherType";

/// Network interface value kept in the config map for older KubeVirt readers
pub const LEGACY_NETWORK_INTERFACE: &str = "masquerade";

/// Keys reset to the desired value on upgrade
const UPGRADE_FORCED_KEYS: [&str; 4] = [
    SMBIOS_CONFIG_KEY,
    MACHINE_TYPE_KEY,
    SELINUX_LAUNCHER_TYPE_KEY,
    USE_EMULATION_KEY,
];

/// Keys no longer understood by KubeVirt, dropped on upgrade
const DEPRECATED_KEYS: [&str; 1] = [MIGRATIONS_CONFIG_KEY];

pub struct KvConfigHooks;

#[async_trait]
impl OperandHooks for KvConfigHooks {
    type Object = ConfigMap;

    const DESCRIPTOR: OperandDescriptor = OperandDescriptor {
        kind: "KubeVirtConfig",
        is_cr: false,
        remove_existing_owner: false,
        set_controller_reference: false,
    };

    fn full_cr(&self, req: &mut OperandRequest<'_>) -> Result<ConfigMap> {
        Ok(new_kubevirt_config(req.instance, req.env))
    }

    async fn update_cr<C: ClusterClient>(
        &self,
        req: &OperandRequest<'_>,
        client: &C,
        found: &ConfigMap,
        desired: &ConfigMap,
    ) -> Result<UpdateOutcome> {
        let mut updated = found.clone();
        let desired_data = desired.data.clone().unwrap_or_default();
        let data = updated.data.get_or_insert_with(BTreeMap::new);

        let mut changed = false;
        if req.upgrade_mode {
            changed |= force_default_keys(data, &desired_data);
            changed |= remove_deprecated_keys(data);
        }
        changed |= sync_key(data, &desired_data, FEATURE_GATES_KEY);

        if updated.metadata.labels != desired.metadata.labels {
            updated.metadata.labels = desired.metadata.labels.clone();
            changed = true;
        }

        if !changed {
            return Ok(UpdateOutcome::Unchanged);
        }

        client.update(&updated).await.map_err(|e| {
            error!(name = %found.name_any(), error = %e, "Failed updating the kubevirt config map");
            e
        })?;

        // Drift on this kind is never reported as an overwrite
        Ok(UpdateOutcome::Updated)
    }
}

/// Build the desired KubeVirt config map
pub fn new_kubevirt_config(hc: &HyperConverged, env: &OperandEnv) -> ConfigMap {
    let mut data = BTreeMap::from([
        (
            FEATURE_GATES_KEY.to_string(),
            feature_gates_string(hc.spec.feature_gates.as_ref()),
        ),
        (
            SELINUX_LAUNCHER_TYPE_KEY.to_string(),
            SELINUX_LAUNCHER_TYPE.to_string(),
        ),
        (
            NETWORK_INTERFACE_KEY.to_string(),
            LEGACY_NETWORK_INTERFACE.to_string(),
        ),
    ]);

    for (key, value) in [
        (SMBIOS_CONFIG_KEY, &env.smbios),
        (MACHINE_TYPE_KEY, &env.machine_type),
        (USE_EMULATION_KEY, &env.kvm_emulation),
    ] {
        if let Some(value) = non_blank(value.as_deref()) {
            data.insert(key.to_string(), value.to_string());
        }
    }

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(KUBEVIRT_CONFIG_NAME.to_string()),
            namespace: hc.namespace(),
            labels: Some(operand_labels(hc, env, AppComponent::Compute)),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    }
}

fn force_default_keys(data: &mut BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for key in UPGRADE_FORCED_KEYS {
        if sync_key(data, desired, key) {
            info!(key, "Updating {} on existing KubeVirt config", key);
            changed = true;
        }
    }
    changed
}

fn remove_deprecated_keys(data: &mut BTreeMap<String, String>) -> bool {
    let mut changed = false;
    for key in DEPRECATED_KEYS {
        if data.remove(key).is_some() {
            info!(key, "Deleting {} on existing KubeVirt config", key);
            changed = true;
        }
    }
    changed
}

/// Make `data[key]` match `desired[key]`; a key absent from `desired` is
/// removed. Returns whether `data` changed.
fn sync_key(data: &mut BTreeMap<String, String>, desired: &BTreeMap<String, String>, key: &str) -> bool {
    match (data.get(key), desired.get(key)) {
        (Some(current), Some(wanted)) if current == wanted => false,
        (None, None) => false,
        (_, Some(wanted)) => {
            data.insert(key.to_string(), wanted.clone());
            true
        }
        (Some(_), None) => {
            data.remove(key);
            true
        }
    }
}
