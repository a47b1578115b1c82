//! Process configuration
//!
//! Environment variables are read once into plain values so that desired
//! objects are built from an explicit snapshot rather than ambient state.

use std::env;

/// Enables software emulation when KVM is unavailable
pub const KVM_EMULATION_ENV: &str = "KVM_EMULATION";
/// YAML or JSON SMBIOS payload for guests
pub const SMBIOS_ENV: &str = "SMBIOS";
/// Default machine type for guests
pub const MACHINE_TYPE_ENV: &str = "MACHINETYPE";
/// KubeVirt version this operator expects to be deployed
pub const KUBEVIRT_VERSION_ENV: &str = "KUBEVIRT_VERSION";
/// Version of this operator
pub const OPERATOR_VERSION_ENV: &str = "OPERATOR_VERSION";

/// Port for the metrics and health endpoints
pub const METRICS_PORT_ENV: &str = "METRICS_PORT";
/// Restrict the controller to one namespace
pub const WATCH_NAMESPACE_ENV: &str = "WATCH_NAMESPACE";

const DEFAULT_METRICS_PORT: u16 = 8080;

/// Snapshot of the environment overrides that feed desired operand state.
///
/// Values are kept raw; blank means "no override" and interpretation is left
/// to the builders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperandEnv {
    pub kvm_emulation: Option<String>,
    pub smbios: Option<String>,
    pub machine_type: Option<String>,
    pub kubevirt_version: Option<String>,
    pub operator_version: Option<String>,
}

impl OperandEnv {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        Self {
            kvm_emulation: lookup(KVM_EMULATION_ENV),
            smbios: lookup(SMBIOS_ENV),
            machine_type: lookup(MACHINE_TYPE_ENV),
            kubevirt_version: lookup(KUBEVIRT_VERSION_ENV),
            operator_version: lookup(OPERATOR_VERSION_ENV),
        }
    }
}

/// Operator process settings
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub metrics_port: u16,
    pub watch_namespace: Option<String>,
}

impl OperatorConfig {
    pub fn from_env() -> crate::Result<Self> {
        let metrics_port = match non_blank(lookup(METRICS_PORT_ENV).as_deref()) {
            Some(port) => port.parse().map_err(|e| {
                crate::Error::config(format!("invalid {METRICS_PORT_ENV} '{port}': {e}"))
            })?,
            None => DEFAULT_METRICS_PORT,
        };

        Ok(Self {
            metrics_port,
            watch_namespace: non_blank(lookup(WATCH_NAMESPACE_ENV).as_deref()).map(str::to_string),
        })
    }
}

fn lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Trimmed value, or None when absent or blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
