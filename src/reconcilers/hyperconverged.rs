//! HyperConverged reconciler
//!
//! Runs one pass over every operand of a HyperConverged record and computes
//! the status the record should carry afterwards:
//! - Upgrade and trigger-origin detection
//! - Operand reconciliation in dependency order
//! - Condition aggregation and version bookkeeping

use k8s_openapi::api::core::v1::ObjectReference;
use kube::{
    api::{Patch, PatchParams},
    Api, Client, ResourceExt,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::client::ClusterClient;
use crate::conditions::{
    set_defaults_for_unset, ConditionSet, CONDITION_PROGRESSING, CONDITION_RECONCILE_COMPLETE,
    CONDITION_UPGRADEABLE, STATUS_FALSE, STATUS_TRUE,
};
use crate::config::{non_blank, OperandEnv};
use crate::crd::{HyperConverged, HyperConvergedStatus, Version};
use crate::error::{Error, Result};
use crate::metrics;
use crate::operands::{ChangeOutcome, EnsureResult, Operand, OperandRequest};

/// Name of the status version entry tracking the operator itself
pub const OPERATOR_VERSION_NAME: &str = "operator";

pub const REASON_RECONCILE_COMPLETED: &str = "ReconcileCompleted";
pub const REASON_RECONCILE_FAILED: &str = "ReconcileFailed";
pub const REASON_UPGRADING: &str = "HCOUpgrading";

const FIELD_MANAGER: &str = "hyperconverged-operator";

/// Operand results of one successful pass, in reconciliation order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassReport {
    pub results: Vec<EnsureResult>,
}

impl PassReport {
    /// Every operand finished its part of the upgrade
    pub fn all_upgrade_done(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.upgrade_done)
    }

    /// Number of operands corrected after an out-of-band modification
    pub fn overwritten(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == ChangeOutcome::Overwritten)
            .count()
    }

    pub fn any_changed(&self) -> bool {
        self.results.iter().any(|r| r.outcome.changed())
    }
}

/// Everything a pass produced: the status to persist and the pass result
#[derive(Debug)]
pub struct PassOutcome {
    pub upgrade_mode: bool,
    pub status: HyperConvergedStatus,
    pub result: Result<PassReport>,
}

/// An operator upgrade is in progress when the target version differs from
/// the one recorded in the status. Without a target version there is nothing
/// to upgrade to.
pub fn is_upgrade_mode(hc: &HyperConverged, env: &OperandEnv) -> bool {
    let Some(target) = non_blank(env.operator_version.as_deref()) else {
        return false;
    };
    let recorded = hc
        .status
        .as_ref()
        .and_then(|s| s.version(OPERATOR_VERSION_NAME));
    recorded != Some(target)
}

/// The pass was caused by a change of the record itself rather than by an
/// event on one of its operands.
pub fn is_hco_triggered(hc: &HyperConverged) -> bool {
    let observed = hc.status.as_ref().and_then(|s| s.observed_generation);
    observed.is_none() || observed != hc.metadata.generation
}

/// Ensure every operand in order, stopping at the first failure.
///
/// Conditions reported by the operands accumulate in `req`.
pub async fn reconcile_operands<C: ClusterClient>(
    client: &C,
    req: &mut OperandRequest<'_>,
) -> Result<PassReport> {
    for operand in Operand::ALL {
        operand.reset(req);
    }

    let mut report = PassReport::default();
    for operand in Operand::ALL {
        let result = operand.ensure(client, req).await.map_err(|e| {
            error!(kind = operand.descriptor().kind, error = %e, "Failed to reconcile operand");
            e
        })?;
        report.results.push(result);
    }
    Ok(report)
}

/// Run one full pass for `hc` and compute its new status
pub async fn run_pass<C: ClusterClient>(
    client: &C,
    hc: &HyperConverged,
    env: &OperandEnv,
) -> PassOutcome {
    let upgrade_mode = is_upgrade_mode(hc, env);
    let hco_triggered = is_hco_triggered(hc);

    info!(
        name = %hc.name_any(),
        upgrade_mode,
        hco_triggered,
        "Reconciling HyperConverged operands"
    );

    let mut req = OperandRequest::new(hc, env)
        .with_upgrade_mode(upgrade_mode)
        .with_hco_triggered(hco_triggered);

    let result = reconcile_operands(client, &mut req).await;
    let status = compute_status(hc, env, upgrade_mode, req.conditions, &result);

    if let Ok(report) = &result {
        let overwritten = report.overwritten();
        if overwritten > 0 {
            warn!(count = overwritten, "Overwrote out-of-band modifications of operands");
        }
    }

    PassOutcome {
        upgrade_mode,
        status,
        result,
    }
}

/// Status of `hc` after a pass.
///
/// Conditions from the pass are merged into the existing ones so that
/// transition times survive unchanged statuses.
pub fn compute_status(
    hc: &HyperConverged,
    env: &OperandEnv,
    upgrade_mode: bool,
    pass_conditions: ConditionSet,
    result: &Result<PassReport>,
) -> HyperConvergedStatus {
    let existing = hc.status.clone().unwrap_or_default();
    let mut pass_conditions = pass_conditions;

    match result {
        Ok(report) => {
            pass_conditions.set(
                CONDITION_RECONCILE_COMPLETE,
                STATUS_TRUE,
                REASON_RECONCILE_COMPLETED,
                "Reconcile completed successfully",
            );
            if upgrade_mode && !report.all_upgrade_done() {
                let message = format!(
                    "HCO is now upgrading to version {}",
                    env.operator_version.as_deref().unwrap_or_default().trim()
                );
                pass_conditions.set(CONDITION_PROGRESSING, STATUS_TRUE, REASON_UPGRADING, &message);
                pass_conditions.set(CONDITION_UPGRADEABLE, STATUS_FALSE, REASON_UPGRADING, message);
            }
            set_defaults_for_unset(&mut pass_conditions, REASON_RECONCILE_COMPLETED);
        }
        Err(e) => {
            pass_conditions.set(
                CONDITION_RECONCILE_COMPLETE,
                STATUS_FALSE,
                REASON_RECONCILE_FAILED,
                format!("Error while reconciling: {e}"),
            );
        }
    }

    let mut conditions = ConditionSet::from_existing(&existing.conditions);
    for c in pass_conditions.into_vec() {
        conditions.set(
            &c.type_,
            &c.status,
            c.reason.as_deref().unwrap_or_default(),
            c.message.unwrap_or_default(),
        );
    }

    let mut related_objects = existing.related_objects;
    if let Ok(report) = result {
        for r in &report.results {
            upsert_related_object(&mut related_objects, r.object_ref.clone());
        }
    }

    let mut versions = existing.versions;
    if let (Ok(report), Some(target)) = (result, non_blank(env.operator_version.as_deref())) {
        if upgrade_mode && report.all_upgrade_done() {
            info!(version = target, "Upgrade complete");
            set_version(&mut versions, OPERATOR_VERSION_NAME, target);
        }
    }

    HyperConvergedStatus {
        conditions: conditions.into_vec(),
        related_objects,
        versions,
        observed_generation: hc.metadata.generation,
    }
}

fn upsert_related_object(objects: &mut Vec<ObjectReference>, reference: ObjectReference) {
    let same = |o: &ObjectReference| {
        o.kind == reference.kind && o.namespace == reference.namespace && o.name == reference.name
    };
    match objects.iter_mut().find(|o| same(o)) {
        Some(existing) => *existing = reference,
        None => objects.push(reference),
    }
}

fn set_version(versions: &mut Vec<Version>, name: &str, version: &str) {
    match versions.iter_mut().find(|v| v.name == name) {
        Some(v) => v.version = version.to_string(),
        None => versions.push(Version {
            name: name.to_string(),
            version: version.to_string(),
        }),
    }
}

/// Persist the computed status on the record
pub async fn update_status(
    hc: &HyperConverged,
    client: &Client,
    status: &HyperConvergedStatus,
) -> Result<()> {
    let namespace = hc
        .namespace()
        .ok_or_else(|| Error::validation("HyperConverged must be namespaced"))?;
    let api: Api<HyperConverged> = Api::namespaced(client.clone(), &namespace);

    let patch = json!({ "status": status });
    api.patch_status(
        &hc.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    Ok(())
}

/// Record whether an upgrade is still rolling out
pub fn record_upgrade_progress(outcome: &PassOutcome) {
    let in_progress = outcome.upgrade_mode
        && !matches!(&outcome.result, Ok(report) if report.all_upgrade_done());
    metrics::UPGRADE_IN_PROGRESS.set(if in_progress { 1.0 } else { 0.0 });
}
