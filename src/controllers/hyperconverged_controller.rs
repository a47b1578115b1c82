//! HyperConverged controller
//!
//! Watches HyperConverged records and the operands they manage, and runs a
//! reconciliation pass whenever either side changes.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::{core::v1::ConfigMap, scheduling::v1::PriorityClass};
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        reflector::{ObjectRef, Store},
        watcher::Config as WatcherConfig,
    },
    Api, Client, Resource, ResourceExt,
};
use tracing::{error, info, instrument, warn};

use crate::config::OperandEnv;
use crate::controllers::Context;
use crate::crd::{HyperConverged, KubeVirt};
use crate::error::{Error, Result};
use crate::metrics;
use crate::operands::{managed_by_selector, APP_LABEL};
use crate::reconcilers::hyperconverged as hco_reconciler;

const KIND: &str = "HyperConverged";

/// Requeue interval while an upgrade is still rolling out
const UPGRADE_REQUEUE: Duration = Duration::from_secs(10);

/// Periodic resync once everything converged
const RESYNC: Duration = Duration::from_secs(300);

/// Run the HyperConverged controller
pub async fn run(client: Client, context: Arc<Context>) {
    let namespace = context.config.watch_namespace.clone();
    let hco_api: Api<HyperConverged> = scoped_api(&client, namespace.as_deref());

    // Verify CRD is installed
    if let Err(e) = hco_api.list(&ListParams::default().limit(1)).await {
        error!("HyperConverged CRD not installed: {}", e);
        return;
    }

    info!(namespace = namespace.as_deref().unwrap_or("*"), "Starting HyperConverged controller");

    let operands = WatcherConfig::default().labels(&managed_by_selector());

    let controller = Controller::new(hco_api, WatcherConfig::default());
    let store = controller.store();
    let config_map_store = store.clone();

    controller
        .owns(
            scoped_api::<KubeVirt>(&client, namespace.as_deref()),
            WatcherConfig::default(),
        )
        .watches(
            scoped_api::<ConfigMap>(&client, namespace.as_deref()),
            operands.clone(),
            move |cm| parents_of(&config_map_store, &cm),
        )
        .watches(
            Api::<PriorityClass>::all(client.clone()),
            operands,
            move |pc| parents_of(&store, &pc),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled HyperConverged"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS.with_label_values(&[KIND]).inc();
                }
            }
        })
        .await;
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// HyperConverged records an operand belongs to, by its `app` label.
///
/// Namespaced operands map to the record in their own namespace;
/// cluster-scoped ones to every known record carrying that name.
fn parents_of<K: Resource>(store: &Store<HyperConverged>, obj: &K) -> Vec<ObjectRef<HyperConverged>> {
    let Some(app) = obj.labels().get(APP_LABEL) else {
        return Vec::new();
    };

    match obj.namespace() {
        Some(ns) => vec![ObjectRef::new(app).within(&ns)],
        None => store
            .state()
            .iter()
            .filter(|hc| &hc.name_any() == app)
            .map(|hc| ObjectRef::from_obj(hc.as_ref()))
            .collect(),
    }
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %hc.name_any(), namespace = hc.namespace()))]
async fn reconcile(hc: Arc<HyperConverged>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&[KIND])
        .start_timer();
    metrics::RECONCILIATIONS.with_label_values(&[KIND]).inc();

    if hc.meta().deletion_timestamp.is_some() {
        info!("HyperConverged is being deleted, skipping");
        return Ok(Action::await_change());
    }

    let env = OperandEnv::from_env();
    let outcome = hco_reconciler::run_pass(&ctx.operand_client, &hc, &env).await;
    hco_reconciler::record_upgrade_progress(&outcome);

    if let Err(e) = hco_reconciler::update_status(&hc, &ctx.client, &outcome.status).await {
        warn!(error = %e, "Failed to update HyperConverged status");
        outcome.result?;
        return Err(e);
    }

    let report = outcome.result?;
    if outcome.upgrade_mode && !report.all_upgrade_done() {
        return Ok(Action::requeue(UPGRADE_REQUEUE));
    }
    Ok(Action::requeue(RESYNC))
}

/// Error policy for the controller
fn error_policy(hc: Arc<HyperConverged>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        name = %hc.name_any(),
        error = %error,
        "Reconciliation failed, scheduling retry"
    );

    let requeue_duration = match error {
        Error::Kube(_) if error.is_conflict() => Duration::from_secs(1),
        Error::Kube(_) => Duration::from_secs(30),
        Error::EnvDecode { .. } | Error::Patch(_) => Duration::from_secs(120),
        Error::Config(_) | Error::Validation(_) => Duration::from_secs(300),
        Error::Serialization(_) => Duration::from_secs(30),
    };

    Action::requeue(requeue_duration)
}
