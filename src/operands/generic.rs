//! Kind-agnostic operand driver
//!
//! One call to [`GenericOperand::ensure`] takes an operand through
//! fetch-or-build desired → lookup live → create or diff. Every state is
//! terminal for the pass; retries are left to the controller's requeue.

use kube::{Resource, ResourceExt};
use tracing::{error, info};

use crate::client::{ClusterClient, ObjectKey};
use crate::conditions::handle_component_conditions;
use crate::error::{Error, Result};
use crate::metrics;

use super::{ChangeOutcome, EnsureResult, OperandHooks, OperandRequest, UpdateOutcome};

/// Drives a single operand kind through its hooks
pub struct GenericOperand<H> {
    hooks: H,
}

impl<H: OperandHooks> GenericOperand<H> {
    pub fn new(hooks: H) -> Self {
        Self { hooks }
    }

    /// Bring the operand in line with the request's parent record
    pub async fn ensure<C: ClusterClient>(
        &self,
        client: &C,
        req: &mut OperandRequest<'_>,
    ) -> Result<EnsureResult> {
        let desired = self.hooks.full_cr(req)?;
        self.hooks.validate(&desired)?;

        let key = ObjectKey::of(&desired);
        match client.get::<H::Object>(&key).await? {
            None => self.create_new_cr(client, req, desired).await,
            Some(found) => self.handle_existing_cr(client, req, &key, found, &desired).await,
        }
    }

    async fn create_new_cr<C: ClusterClient>(
        &self,
        client: &C,
        req: &OperandRequest<'_>,
        mut desired: H::Object,
    ) -> Result<EnsureResult> {
        let kind = H::DESCRIPTOR.kind;
        info!(kind, name = %desired.name_any(), "Creating {}", kind);

        if H::DESCRIPTOR.set_controller_reference {
            let owner = req.instance.controller_owner_ref(&()).ok_or_else(|| {
                Error::validation(format!(
                    "cannot set owner of {kind}: HyperConverged {} has no uid",
                    req.instance.name_any()
                ))
            })?;
            self.hooks.object_meta(&mut desired).owner_references = Some(vec![owner]);
        }

        let created = client.create(&desired).await.map_err(|e| {
            error!(kind, error = %e, "Failed to create object for {}", kind);
            e
        })?;

        record_change(kind, ChangeOutcome::Created);
        Ok(EnsureResult {
            kind,
            name: created.name_any(),
            outcome: ChangeOutcome::Created,
            upgrade_done: false,
            object_ref: created.object_ref(&()),
        })
    }

    async fn handle_existing_cr<C: ClusterClient>(
        &self,
        client: &C,
        req: &mut OperandRequest<'_>,
        key: &ObjectKey,
        mut found: H::Object,
        desired: &H::Object,
    ) -> Result<EnsureResult> {
        let kind = H::DESCRIPTOR.kind;
        info!(kind, %key, "{} already exists", kind);

        self.hooks.post_found(req, &found)?;

        if H::DESCRIPTOR.remove_existing_owner {
            let owners = self.hooks.object_meta(&mut found);
            if owners.owner_references.as_ref().is_some_and(|o| !o.is_empty()) {
                info!(kind, %key, "{} has owners, removing them", kind);
                owners.owner_references = None;
                client.update(&found).await?;
                return Ok(self.changed(&found, UpdateOutcome::Updated.into()));
            }
        }

        let outcome = self.hooks.update_cr(req, client, &found, desired).await?;
        if outcome.changed() {
            return Ok(self.changed(&found, outcome.into()));
        }

        let upgrade_done = if H::DESCRIPTOR.is_cr {
            let conditions = self.hooks.conditions(&found);
            let ready = handle_component_conditions(&mut req.conditions, kind, &conditions);
            req.upgrade_mode && ready && self.hooks.check_component_version(&found, req.env)
        } else {
            req.upgrade_mode
        };

        Ok(EnsureResult {
            kind,
            name: found.name_any(),
            outcome: ChangeOutcome::Unchanged,
            upgrade_done,
            object_ref: found.object_ref(&()),
        })
    }

    fn changed(&self, found: &H::Object, outcome: ChangeOutcome) -> EnsureResult {
        let kind = H::DESCRIPTOR.kind;
        record_change(kind, outcome);
        EnsureResult {
            kind,
            name: found.name_any(),
            outcome,
            upgrade_done: false,
            object_ref: found.object_ref(&()),
        }
    }
}

fn record_change(kind: &str, outcome: ChangeOutcome) {
    metrics::OPERAND_CHANGES
        .with_label_values(&[kind, outcome.as_str()])
        .inc();
    if outcome == ChangeOutcome::Overwritten {
        metrics::OVERWRITTEN_MODIFICATIONS
            .with_label_values(&[kind])
            .inc();
    }
}
