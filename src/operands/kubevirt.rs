//! KubeVirt operand: desired-state builder and hooks

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use tracing::info;

use crate::client::ClusterClient;
use crate::config::{non_blank, OperandEnv, KVM_EMULATION_ENV, SMBIOS_ENV};
use crate::crd::{
    ComponentConfig, Condition, DeveloperConfiguration, HyperConverged, HyperConvergedConfig,
    KubeVirt, KubeVirtCondition, KubeVirtConfiguration, KubeVirtSpec, NetworkConfiguration,
    NodePlacement, SmbiosConfiguration, UNINSTALL_BLOCK_IF_WORKLOADS_EXIST,
};
use crate::error::{Error, Result};

use super::feature_gates::{enabled_conditional_gates, kubevirt_feature_gates};
use super::labels::{operand_labels, AppComponent};
use super::patch::{apply_patch_to_spec, JSON_PATCH_KV_ANNOTATION};
use super::{OperandDescriptor, OperandHooks, OperandRequest, UpdateOutcome};

/// SELinux type virt-launcher pods run with
pub const SELINUX_LAUNCHER_TYPE: &str = "virt_launcher.process";

/// Default guest network interface binding set on the KubeVirt CR
pub const DEFAULT_NETWORK_INTERFACE: &str = "bridge";

pub struct KubeVirtHooks;

#[async_trait]
impl OperandHooks for KubeVirtHooks {
    type Object = KubeVirt;

    const DESCRIPTOR: OperandDescriptor = OperandDescriptor {
        kind: "KubeVirt",
        is_cr: true,
        remove_existing_owner: false,
        set_controller_reference: true,
    };

    fn full_cr(&self, req: &mut OperandRequest<'_>) -> Result<KubeVirt> {
        if let Some(kv) = &req.cache().kubevirt {
            return Ok(kv.clone());
        }
        let kv = new_kubevirt(req.instance, req.env)?;
        Ok(req.cache().kubevirt.insert(kv).clone())
    }

    fn conditions(&self, found: &KubeVirt) -> Vec<Condition> {
        found
            .status
            .as_ref()
            .map(|s| translate_kubevirt_conditions(&s.conditions))
            .unwrap_or_default()
    }

    fn check_component_version(&self, found: &KubeVirt, env: &OperandEnv) -> bool {
        let observed = found
            .status
            .as_ref()
            .and_then(|s| s.observed_kube_virt_version.as_deref());
        match (non_blank(env.kubevirt_version.as_deref()), observed) {
            (Some(expected), Some(observed)) => expected == observed,
            _ => false,
        }
    }

    fn reset(&self, req: &mut OperandRequest<'_>) {
        req.cache().kubevirt = None;
    }

    async fn update_cr<C: ClusterClient>(
        &self,
        req: &OperandRequest<'_>,
        client: &C,
        found: &KubeVirt,
        desired: &KubeVirt,
    ) -> Result<UpdateOutcome> {
        let spec = with_live_unmodelled(&found.spec, &desired.spec);
        if found.spec == spec && found.metadata.labels == desired.metadata.labels {
            return Ok(UpdateOutcome::Unchanged);
        }

        if req.hco_triggered {
            info!(name = %found.name_any(), "Updating existing KubeVirt's Spec to new opinionated values");
        } else {
            info!(name = %found.name_any(), "Reconciling an externally updated KubeVirt's Spec to its opinionated values");
        }

        let mut updated = found.clone();
        updated.metadata.labels = desired.metadata.labels.clone();
        updated.spec = spec;
        client.update(&updated).await?;

        Ok(UpdateOutcome::changed_by(req.hco_triggered))
    }
}

/// Name of the KubeVirt CR for a HyperConverged record
pub fn kubevirt_name(hc: &HyperConverged) -> String {
    format!("kubevirt-{}", hc.name_any())
}

/// Build the desired KubeVirt CR.
///
/// The JSON patch annotation is applied last and may override anything set
/// before it. Any failure discards the object.
pub fn new_kubevirt(hc: &HyperConverged, env: &OperandEnv) -> Result<KubeVirt> {
    let mut kv = new_kubevirt_with_name_only(hc, env);
    kv.spec = KubeVirtSpec {
        uninstall_strategy: Some(UNINSTALL_BLOCK_IF_WORKLOADS_EXIST.to_string()),
        infra: hco_config_to_kv_config(&hc.spec.infra),
        workloads: hco_config_to_kv_config(&hc.spec.workloads),
        configuration: kubevirt_configuration(hc, env)?,
        ..Default::default()
    };

    apply_patch_to_spec(hc, JSON_PATCH_KV_ANNOTATION, kv)
}

/// KubeVirt CR with identity and labels only
pub fn new_kubevirt_with_name_only(hc: &HyperConverged, env: &OperandEnv) -> KubeVirt {
    let mut kv = KubeVirt::new(&kubevirt_name(hc), KubeVirtSpec::default());
    kv.metadata.namespace = hc.namespace();
    kv.metadata.labels = Some(operand_labels(hc, env, AppComponent::Compute));
    kv
}

fn kubevirt_configuration(hc: &HyperConverged, env: &OperandEnv) -> Result<KubeVirtConfiguration> {
    let developer_configuration = developer_configuration(hc, env)?;

    let smbios = match non_blank(env.smbios.as_deref()) {
        Some(raw) => Some(decode_smbios(raw)?),
        None => None,
    };

    Ok(KubeVirtConfiguration {
        developer_configuration,
        selinux_launcher_type: Some(SELINUX_LAUNCHER_TYPE.to_string()),
        network: Some(NetworkConfiguration {
            default_network_interface: Some(DEFAULT_NETWORK_INTERFACE.to_string()),
            ..Default::default()
        }),
        smbios,
        machine_type: non_blank(env.machine_type.as_deref()).map(str::to_string),
        ..Default::default()
    })
}

/// Developer configuration, present only when an admin gate is on or
/// emulation is requested.
fn developer_configuration(
    hc: &HyperConverged,
    env: &OperandEnv,
) -> Result<Option<DeveloperConfiguration>> {
    let use_emulation = kvm_emulation(env)?;
    let gates = hc.spec.feature_gates.as_ref();

    if enabled_conditional_gates(gates).is_empty() && !use_emulation {
        return Ok(None);
    }

    Ok(Some(DeveloperConfiguration {
        feature_gates: kubevirt_feature_gates(gates),
        use_emulation,
        ..Default::default()
    }))
}

/// Emulation flag from the environment; blank or absent means off
pub fn kvm_emulation(env: &OperandEnv) -> Result<bool> {
    match non_blank(env.kvm_emulation.as_deref()) {
        Some(raw) => parse_bool(raw)
            .ok_or_else(|| Error::env_decode(KVM_EMULATION_ENV, format!("invalid boolean '{raw}'"))),
        None => Ok(false),
    }
}

/// Accepts the usual spellings of a boolean: 1/0, t/f, true/false in lower,
/// upper or title case.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Decode a YAML or JSON SMBIOS payload
pub fn decode_smbios(raw: &str) -> Result<SmbiosConfiguration> {
    serde_yaml::from_str(raw).map_err(|e| Error::env_decode(SMBIOS_ENV, e))
}

fn hco_config_to_kv_config(config: &HyperConvergedConfig) -> Option<ComponentConfig> {
    let placement = config.node_placement.as_ref()?;

    Some(ComponentConfig {
        node_placement: Some(NodePlacement {
            node_selector: placement.node_selector.clone(),
            affinity: placement.affinity.clone(),
            tolerations: placement.tolerations.clone().filter(|t| !t.is_empty()),
        }),
        ..Default::default()
    })
}

/// Desired spec with the fields this operator does not build taken from the
/// live object. Fields set by the JSON patch win over live values.
fn with_live_unmodelled(found: &KubeVirtSpec, desired: &KubeVirtSpec) -> KubeVirtSpec {
    let mut spec = desired.clone();
    keep_missing(&mut spec.extra, &found.extra);

    let config = &mut spec.configuration;
    keep_missing(&mut config.extra, &found.configuration.extra);
    if let (Some(dev), Some(live)) = (
        config.developer_configuration.as_mut(),
        found.configuration.developer_configuration.as_ref(),
    ) {
        keep_missing(&mut dev.extra, &live.extra);
    }
    if let (Some(net), Some(live)) = (config.network.as_mut(), found.configuration.network.as_ref()) {
        keep_missing(&mut net.extra, &live.extra);
    }
    for (component, live) in [
        (spec.infra.as_mut(), found.infra.as_ref()),
        (spec.workloads.as_mut(), found.workloads.as_ref()),
    ] {
        if let (Some(component), Some(live)) = (component, live) {
            keep_missing(&mut component.extra, &live.extra);
        }
    }
    spec
}

fn keep_missing(into: &mut BTreeMap<String, Value>, live: &BTreeMap<String, Value>) {
    for (key, value) in live {
        into.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

/// Translate KubeVirt conditions into the shared condition vocabulary
pub fn translate_kubevirt_conditions(conditions: &[KubeVirtCondition]) -> Vec<Condition> {
    conditions
        .iter()
        .map(|c| Condition {
            type_: c.type_.clone(),
            status: c.status.clone(),
            last_transition_time: None,
            reason: c.reason.clone(),
            message: c.message.clone(),
        })
        .collect()
}
