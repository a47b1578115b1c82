//! Aggregated status conditions of the HyperConverged record
//!
//! Operands report conditions in their own vocabulary; they are folded here
//! into the standard Available / Progressing / Degraded / Upgradeable set.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::crd::Condition;

pub const CONDITION_AVAILABLE: &str = "Available";
pub const CONDITION_PROGRESSING: &str = "Progressing";
pub const CONDITION_DEGRADED: &str = "Degraded";
pub const CONDITION_UPGRADEABLE: &str = "Upgradeable";
pub const CONDITION_RECONCILE_COMPLETE: &str = "ReconcileComplete";

pub const STATUS_TRUE: &str = "True";
pub const STATUS_FALSE: &str = "False";

/// Conditions keyed by type, at most one per type
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionSet {
    conditions: BTreeMap<String, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a condition, keeping the previous transition time when the status
    /// did not change.
    pub fn set(&mut self, type_: &str, status: &str, reason: &str, message: impl Into<String>) {
        let last_transition_time = match self.conditions.get(type_) {
            Some(prev) if prev.status == status => prev.last_transition_time,
            _ => Some(Utc::now()),
        };
        self.conditions.insert(
            type_.to_string(),
            Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                last_transition_time,
                reason: Some(reason.to_string()),
                message: Some(message.into()),
            },
        );
    }

    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.conditions.get(type_)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `type_` is set with the given status
    pub fn is_status(&self, type_: &str, status: &str) -> bool {
        self.get(type_).is_some_and(|c| c.status == status)
    }

    /// Seed from an existing status so transition times survive a pass
    pub fn from_existing(existing: &[Condition]) -> Self {
        Self {
            conditions: existing
                .iter()
                .map(|c| (c.type_.clone(), c.clone()))
                .collect(),
        }
    }

    pub fn into_vec(self) -> Vec<Condition> {
        self.conditions.into_values().collect()
    }
}

/// Fold a component's conditions into `set`. Returns whether the component
/// is ready: available, not progressing and not degraded.
pub fn handle_component_conditions(
    set: &mut ConditionSet,
    component: &str,
    conditions: &[Condition],
) -> bool {
    if conditions.is_empty() {
        let reason = format!("{component}Conditions");
        let message = format!("{component} resource has no conditions");
        set.set(CONDITION_AVAILABLE, STATUS_FALSE, &reason, &message);
        set.set(CONDITION_PROGRESSING, STATUS_TRUE, &reason, &message);
        set.set(CONDITION_UPGRADEABLE, STATUS_FALSE, &reason, message);
        return false;
    }

    let mut ready = true;
    let mut found_available = false;
    let mut found_progressing = false;
    let mut found_degraded = false;

    for condition in conditions {
        let message = condition.message.clone().unwrap_or_default();
        match condition.type_.as_str() {
            CONDITION_AVAILABLE => {
                found_available = true;
                if condition.status == STATUS_FALSE {
                    ready = false;
                    set.set(
                        CONDITION_AVAILABLE,
                        STATUS_FALSE,
                        &format!("{component}NotAvailable"),
                        format!("{component} is not available: {message}"),
                    );
                }
            }
            CONDITION_PROGRESSING => {
                found_progressing = true;
                if condition.status == STATUS_TRUE {
                    ready = false;
                    let reason = format!("{component}Progressing");
                    let message = format!("{component} is progressing: {message}");
                    set.set(CONDITION_PROGRESSING, STATUS_TRUE, &reason, &message);
                    set.set(CONDITION_UPGRADEABLE, STATUS_FALSE, &reason, message);
                }
            }
            CONDITION_DEGRADED => {
                found_degraded = true;
                if condition.status == STATUS_TRUE {
                    ready = false;
                    set.set(
                        CONDITION_DEGRADED,
                        STATUS_TRUE,
                        &format!("{component}Degraded"),
                        format!("{component} is degraded: {message}"),
                    );
                }
            }
            _ => {}
        }
    }

    if !found_available {
        ready = false;
        set.set(
            CONDITION_AVAILABLE,
            STATUS_FALSE,
            &format!("{component}NotAvailable"),
            format!("{component} has no {CONDITION_AVAILABLE} condition"),
        );
    }
    if !found_progressing {
        ready = false;
        set.set(
            CONDITION_PROGRESSING,
            STATUS_TRUE,
            &format!("{component}Progressing"),
            format!("{component} has no {CONDITION_PROGRESSING} condition"),
        );
    }
    if !found_degraded {
        ready = false;
        set.set(
            CONDITION_DEGRADED,
            STATUS_TRUE,
            &format!("{component}Degraded"),
            format!("{component} has no {CONDITION_DEGRADED} condition"),
        );
    }

    ready
}

/// Fill in healthy defaults for every standard condition no component
/// complained about.
pub fn set_defaults_for_unset(set: &mut ConditionSet, reconcile_reason: &str) {
    for (type_, status) in [
        (CONDITION_AVAILABLE, STATUS_TRUE),
        (CONDITION_PROGRESSING, STATUS_FALSE),
        (CONDITION_DEGRADED, STATUS_FALSE),
        (CONDITION_UPGRADEABLE, STATUS_TRUE),
    ] {
        if set.get(type_).is_none() {
            set.set(type_, status, reconcile_reason, "Reconcile completed successfully");
        }
    }
}
