//! Operand reconciliation
//!
//! An operand is a dependent cluster object the operator keeps in sync with
//! the HyperConverged record. Each kind plugs into the kind-agnostic
//! [`GenericOperand`] driver through the [`OperandHooks`] capability trait;
//! the closed set of kinds is the [`Operand`] enum.

mod feature_gates;
mod generic;
mod kubevirt;
mod kv_config;
mod labels;
mod patch;
mod priority_class;

pub use feature_gates::*;
pub use generic::GenericOperand;
pub use kubevirt::*;
pub use kv_config::*;
pub use labels::*;
pub use patch::*;
pub use priority_class::*;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{api::ObjectMeta, Resource};

use crate::client::{ClusterClient, ManagedObject};
use crate::conditions::ConditionSet;
use crate::config::OperandEnv;
use crate::crd::{Condition, HyperConverged, KubeVirt};
use crate::error::Result;

/// Static description of an operand kind, steering the generic driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperandDescriptor {
    /// Kind name used in logs, metrics and conditions
    pub kind: &'static str,
    /// The kind is a custom resource with its own status and version
    pub is_cr: bool,
    /// Strip owner references found on an existing object
    pub remove_existing_owner: bool,
    /// Make the HyperConverged record the controller owner on create
    pub set_controller_reference: bool,
}

/// Desired objects built during the current pass
#[derive(Debug, Default)]
pub struct DesiredCache {
    kubevirt: Option<KubeVirt>,
}

/// Context of one reconciliation pass over the operands of a single
/// HyperConverged record.
///
/// A request is built fresh for every pass and owns the desired-object cache,
/// so nothing built in one pass can leak into the next.
#[derive(Debug)]
pub struct OperandRequest<'a> {
    /// The parent record
    pub instance: &'a HyperConverged,
    /// Environment snapshot the desired objects are built from
    pub env: &'a OperandEnv,
    /// An operator upgrade is in progress; enables forced-default corrections
    pub upgrade_mode: bool,
    /// The pass was caused by a change of the parent record rather than by
    /// drift observed on an operand
    pub hco_triggered: bool,
    /// Conditions collected from the operands during this pass
    pub conditions: ConditionSet,
    cache: DesiredCache,
}

impl<'a> OperandRequest<'a> {
    pub fn new(instance: &'a HyperConverged, env: &'a OperandEnv) -> Self {
        Self {
            instance,
            env,
            upgrade_mode: false,
            hco_triggered: true,
            conditions: ConditionSet::new(),
            cache: DesiredCache::default(),
        }
    }

    pub fn with_upgrade_mode(mut self, upgrade_mode: bool) -> Self {
        self.upgrade_mode = upgrade_mode;
        self
    }

    pub fn with_hco_triggered(mut self, hco_triggered: bool) -> Self {
        self.hco_triggered = hco_triggered;
        self
    }

    pub(crate) fn cache(&mut self) -> &mut DesiredCache {
        &mut self.cache
    }
}

/// What `update_cr` did to an existing object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Already matched the desired state
    Unchanged,
    /// Changed as part of the operator's own drive
    Updated,
    /// Changed to undo a modification made outside the operator
    Overwritten,
}

impl UpdateOutcome {
    /// Outcome of a change, attributed by what triggered the pass
    pub fn changed_by(hco_triggered: bool) -> Self {
        if hco_triggered {
            UpdateOutcome::Updated
        } else {
            UpdateOutcome::Overwritten
        }
    }

    pub fn changed(self) -> bool {
        self != UpdateOutcome::Unchanged
    }

    pub fn overwritten(self) -> bool {
        self == UpdateOutcome::Overwritten
    }
}

/// Terminal state of one operand in one pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    Unchanged,
    Created,
    Updated,
    Overwritten,
}

impl ChangeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeOutcome::Unchanged => "unchanged",
            ChangeOutcome::Created => "created",
            ChangeOutcome::Updated => "updated",
            ChangeOutcome::Overwritten => "overwritten",
        }
    }

    pub fn changed(self) -> bool {
        self != ChangeOutcome::Unchanged
    }
}

impl From<UpdateOutcome> for ChangeOutcome {
    fn from(outcome: UpdateOutcome) -> Self {
        match outcome {
            UpdateOutcome::Unchanged => ChangeOutcome::Unchanged,
            UpdateOutcome::Updated => ChangeOutcome::Updated,
            UpdateOutcome::Overwritten => ChangeOutcome::Overwritten,
        }
    }
}

/// Result of ensuring one operand
#[derive(Clone, Debug, PartialEq)]
pub struct EnsureResult {
    pub kind: &'static str,
    pub name: String,
    pub outcome: ChangeOutcome,
    /// The operand is at the expected version and ready during an upgrade
    pub upgrade_done: bool,
    /// Reference to the operand object for the parent's related objects
    pub object_ref: ObjectReference,
}

/// Capabilities a dependent kind provides to the generic driver
#[async_trait]
pub trait OperandHooks: Send + Sync {
    type Object: ManagedObject;

    const DESCRIPTOR: OperandDescriptor;

    /// Desired object for the request's parent record; cached kinds return
    /// the same object for every call within a pass.
    fn full_cr(&self, req: &mut OperandRequest<'_>) -> Result<Self::Object>;

    /// Sanity check of the desired object before it reaches the cluster
    fn validate(&self, _desired: &Self::Object) -> Result<()> {
        Ok(())
    }

    /// Side effect run once the live object was found, before diffing
    fn post_found(&self, _req: &OperandRequest<'_>, _found: &Self::Object) -> Result<()> {
        Ok(())
    }

    /// Status conditions of the live object in the shared vocabulary
    fn conditions(&self, _found: &Self::Object) -> Vec<Condition> {
        Vec::new()
    }

    /// Whether the live object reports the expected component version
    fn check_component_version(&self, _found: &Self::Object, _env: &OperandEnv) -> bool {
        true
    }

    fn object_meta<'o>(&self, obj: &'o mut Self::Object) -> &'o mut ObjectMeta {
        obj.meta_mut()
    }

    /// Drop any desired object cached in the request
    fn reset(&self, _req: &mut OperandRequest<'_>) {}

    /// Diff `found` against `desired` and apply the kind-specific mutation.
    async fn update_cr<C: ClusterClient>(
        &self,
        req: &OperandRequest<'_>,
        client: &C,
        found: &Self::Object,
        desired: &Self::Object,
    ) -> Result<UpdateOutcome>;
}

/// The dependent kinds managed for a HyperConverged record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    KubeVirtConfig,
    KubeVirtPriorityClass,
    KubeVirt,
}

impl Operand {
    /// Operands in reconciliation order. KubeVirt comes last because it
    /// consumes the config map and priority class.
    pub const ALL: [Operand; 3] = [
        Operand::KubeVirtConfig,
        Operand::KubeVirtPriorityClass,
        Operand::KubeVirt,
    ];

    pub fn descriptor(self) -> OperandDescriptor {
        match self {
            Operand::KubeVirtConfig => KvConfigHooks::DESCRIPTOR,
            Operand::KubeVirtPriorityClass => KvPriorityClassHooks::DESCRIPTOR,
            Operand::KubeVirt => KubeVirtHooks::DESCRIPTOR,
        }
    }

    pub fn reset(self, req: &mut OperandRequest<'_>) {
        match self {
            Operand::KubeVirtConfig => KvConfigHooks.reset(req),
            Operand::KubeVirtPriorityClass => KvPriorityClassHooks.reset(req),
            Operand::KubeVirt => KubeVirtHooks.reset(req),
        }
    }

    /// Create, update or leave alone this operand for the request's parent
    pub async fn ensure<C: ClusterClient>(
        self,
        client: &C,
        req: &mut OperandRequest<'_>,
    ) -> Result<EnsureResult> {
        match self {
            Operand::KubeVirtConfig => GenericOperand::new(KvConfigHooks).ensure(client, req).await,
            Operand::KubeVirtPriorityClass => {
                GenericOperand::new(KvPriorityClassHooks)
                    .ensure(client, req)
                    .await
            }
            Operand::KubeVirt => GenericOperand::new(KubeVirtHooks).ensure(client, req).await,
        }
    }
}
