//! Integration tests for operand reconciliation
//!
//! These tests drive the operands and the full pass against an in-memory
//! cluster that records every call made to it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::scheduling::v1::PriorityClass;
use kube::error::ErrorResponse;
use kube::{Resource, ResourceExt};

use hyperconverged_operator::client::{ClusterClient, ManagedObject, ObjectKey};
use hyperconverged_operator::conditions::{
    ConditionSet, CONDITION_AVAILABLE, CONDITION_RECONCILE_COMPLETE, STATUS_FALSE, STATUS_TRUE,
};
use hyperconverged_operator::config::OperandEnv;
use hyperconverged_operator::crd::{
    HyperConverged, HyperConvergedFeatureGates, HyperConvergedSpec, HyperConvergedStatus,
    KubeVirt, KubeVirtCondition, KubeVirtStatus, Version,
};
use hyperconverged_operator::operands::{
    ChangeOutcome, Operand, OperandRequest, KUBEVIRT_CONFIG_NAME, KUBEVIRT_PRIORITY_CLASS_NAME,
    JSON_PATCH_KV_ANNOTATION, MIGRATIONS_CONFIG_KEY, SELINUX_LAUNCHER_TYPE,
    SELINUX_LAUNCHER_TYPE_KEY,
};
use hyperconverged_operator::reconcilers::hyperconverged::{
    reconcile_operands, run_pass, OPERATOR_VERSION_NAME,
};
use hyperconverged_operator::{Error, Result};

// ============================================================================
// Fake cluster
// ============================================================================

const NAMESPACE: &str = "kubevirt-hyperconverged";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Call {
    op: Op,
    kind: String,
    name: String,
}

type StoreKey = (String, Option<String>, String);

#[derive(Default)]
struct FakeCluster {
    objects: Mutex<HashMap<StoreKey, serde_json::Value>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<Vec<(Op, String, u16)>>,
}

impl FakeCluster {
    fn store_key<K: ManagedObject>(namespace: Option<String>, name: String) -> StoreKey {
        (K::kind(&()).into_owned(), namespace, name)
    }

    fn record<K: ManagedObject>(&self, op: Op, name: &str) -> Result<()> {
        let kind = K::kind(&()).into_owned();
        self.calls.lock().unwrap().push(Call {
            op,
            kind: kind.clone(),
            name: name.to_string(),
        });

        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|(o, k, _)| *o == op && *k == kind) {
            let (_, _, code) = failures.remove(pos);
            return Err(api_error(code));
        }
        Ok(())
    }

    /// Fail the next `op` on `kind` with the given HTTP status
    fn fail_next<K: ManagedObject>(&self, op: Op, code: u16) {
        self.failures
            .lock()
            .unwrap()
            .push((op, K::kind(&()).into_owned(), code));
    }

    /// Put an object in place without recording a call
    fn put<K: ManagedObject>(&self, obj: &K) {
        let key = Self::store_key::<K>(obj.namespace(), obj.name_any());
        let value = serde_json::to_value(obj).unwrap();
        self.objects.lock().unwrap().insert(key, value);
    }

    fn object<K: ManagedObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let key = Self::store_key::<K>(namespace.map(str::to_string), name.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.op != Op::Get)
            .collect()
    }

    fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

fn api_error(code: u16) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected failure {code}"),
        reason: "Injected".to_string(),
        code,
    }))
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        self.record::<K>(Op::Get, &key.name)?;
        Ok(self.object(key.namespace.as_deref(), &key.name))
    }

    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        self.record::<K>(Op::Create, &obj.name_any())?;
        let key = Self::store_key::<K>(obj.namespace(), obj.name_any());
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&key) {
            return Err(api_error(409));
        }
        let mut created = obj.clone();
        created.meta_mut().resource_version = Some("1".to_string());
        objects.insert(key, serde_json::to_value(&created)?);
        Ok(created)
    }

    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        self.record::<K>(Op::Update, &obj.name_any())?;
        let key = Self::store_key::<K>(obj.namespace(), obj.name_any());
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&key) {
            return Err(api_error(404));
        }
        objects.insert(key, serde_json::to_value(obj)?);
        Ok(obj.clone())
    }

    async fn delete<K: ManagedObject>(&self, obj: &K) -> Result<()> {
        self.record::<K>(Op::Delete, &obj.name_any())?;
        let key = Self::store_key::<K>(obj.namespace(), obj.name_any());
        match self.objects.lock().unwrap().remove(&key) {
            Some(_) => Ok(()),
            None => Err(api_error(404)),
        }
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

fn hco() -> HyperConverged {
    let mut hc = HyperConverged::new("kubevirt-hyperconverged", HyperConvergedSpec::default());
    hc.metadata.namespace = Some(NAMESPACE.to_string());
    hc.metadata.uid = Some("b6c1a0a6-5f4e-4d7b-8f5e-0a1b2c3d4e5f".to_string());
    hc.metadata.generation = Some(1);
    hc
}

fn call(op: Op, kind: &str, name: &str) -> Call {
    Call {
        op,
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

fn kubevirt_name() -> String {
    "kubevirt-kubevirt-hyperconverged".to_string()
}

async fn converge(cluster: &FakeCluster, hc: &HyperConverged, env: &OperandEnv) {
    let mut req = OperandRequest::new(hc, env);
    reconcile_operands(cluster, &mut req).await.unwrap();
    cluster.clear_calls();
}

fn healthy_status(version: &str) -> KubeVirtStatus {
    let cond = |type_: &str, status: &str| KubeVirtCondition {
        type_: type_.to_string(),
        status: status.to_string(),
        reason: Some("AllComponentsReady".to_string()),
        message: None,
    };
    KubeVirtStatus {
        phase: Some("Deployed".to_string()),
        conditions: vec![
            cond("Available", "True"),
            cond("Progressing", "False"),
            cond("Degraded", "False"),
        ],
        observed_kube_virt_version: Some(version.to_string()),
    }
}

// ============================================================================
// Create and idempotence
// ============================================================================

#[tokio::test]
async fn test_first_pass_creates_operands_in_order() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    let mut req = OperandRequest::new(&hc, &env);

    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    let outcomes: Vec<_> = report.results.iter().map(|r| (r.kind, r.outcome)).collect();
    assert_eq!(
        outcomes,
        vec![
            ("KubeVirtConfig", ChangeOutcome::Created),
            ("KubeVirtPriorityClass", ChangeOutcome::Created),
            ("KubeVirt", ChangeOutcome::Created),
        ]
    );
    assert_eq!(
        cluster.mutations(),
        vec![
            call(Op::Create, "ConfigMap", KUBEVIRT_CONFIG_NAME),
            call(Op::Create, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME),
            call(Op::Create, "KubeVirt", &kubevirt_name()),
        ]
    );
    assert!(report.results.iter().all(|r| !r.upgrade_done));
}

#[tokio::test]
async fn test_only_kubevirt_is_owned_by_hco() {
    let cluster = FakeCluster::default();
    let hc = hco();
    converge(&cluster, &hc, &OperandEnv::default()).await;

    let kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    let owners = kv.owner_references();
    assert_eq!(owners.len(), 1);
    assert_eq!(owners[0].kind, "HyperConverged");
    assert_eq!(owners[0].controller, Some(true));
    assert_eq!(Some(&owners[0].uid), hc.metadata.uid.as_ref());

    let cm: ConfigMap = cluster.object(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME).unwrap();
    assert!(cm.owner_references().is_empty());
    let pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    assert!(pc.owner_references().is_empty());
}

#[tokio::test]
async fn test_missing_uid_prevents_kubevirt_create() {
    let cluster = FakeCluster::default();
    let mut hc = hco();
    hc.metadata.uid = None;
    let env = OperandEnv::default();
    let mut req = OperandRequest::new(&hc, &env);

    let err = reconcile_operands(&cluster, &mut req).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(cluster.object::<KubeVirt>(Some(NAMESPACE), &kubevirt_name()).is_none());
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let cluster = FakeCluster::default();
    let mut hc = hco();
    hc.spec.feature_gates = Some(HyperConvergedFeatureGates {
        gpu: Some(true),
        ..Default::default()
    });
    let env = OperandEnv {
        smbios: Some("manufacturer: Acme".to_string()),
        operator_version: Some("1.4.0".to_string()),
        ..Default::default()
    };
    converge(&cluster, &hc, &env).await;

    let mut req = OperandRequest::new(&hc, &env);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    assert!(!report.any_changed());
    assert!(cluster.mutations().is_empty());
    assert_eq!(
        cluster.calls(),
        vec![
            call(Op::Get, "ConfigMap", KUBEVIRT_CONFIG_NAME),
            call(Op::Get, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME),
            call(Op::Get, "KubeVirt", &kubevirt_name()),
        ]
    );
    // KubeVirt has not reported any condition yet
    assert!(req.conditions.is_status(CONDITION_AVAILABLE, STATUS_FALSE));
}

// ============================================================================
// Priority class
// ============================================================================

#[tokio::test]
async fn test_priority_class_drift_is_deleted_and_recreated() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    pc.value = 100;
    cluster.put(&pc);

    let mut req = OperandRequest::new(&hc, &env).with_hco_triggered(false);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    assert_eq!(report.results[1].outcome, ChangeOutcome::Overwritten);
    assert_eq!(report.overwritten(), 1);
    assert_eq!(
        cluster.mutations(),
        vec![
            call(Op::Delete, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME),
            call(Op::Create, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME),
        ]
    );
    let pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    assert_eq!(pc.value, 1_000_000_000);
}

#[tokio::test]
async fn test_failed_recreate_heals_on_next_pass() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    pc.description = Some("changed".to_string());
    cluster.put(&pc);
    cluster.fail_next::<PriorityClass>(Op::Create, 500);

    let mut req = OperandRequest::new(&hc, &env);
    let err = reconcile_operands(&cluster, &mut req).await.unwrap_err();
    assert_eq!(err.api_code(), Some(500));
    assert!(cluster.object::<PriorityClass>(None, KUBEVIRT_PRIORITY_CLASS_NAME).is_none());
    cluster.clear_calls();

    let mut req = OperandRequest::new(&hc, &env);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();
    assert_eq!(report.results[1].outcome, ChangeOutcome::Created);
    assert_eq!(
        cluster.mutations(),
        vec![call(Op::Create, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME)]
    );
}

#[tokio::test]
async fn test_failed_delete_leaves_priority_class_in_place() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    pc.value = 100;
    cluster.put(&pc);
    cluster.fail_next::<PriorityClass>(Op::Delete, 500);

    let mut req = OperandRequest::new(&hc, &env);
    let err = reconcile_operands(&cluster, &mut req).await.unwrap_err();

    assert_eq!(err.api_code(), Some(500));
    assert_eq!(
        cluster.mutations(),
        vec![call(Op::Delete, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME)]
    );
    let pc: PriorityClass = cluster.object(None, KUBEVIRT_PRIORITY_CLASS_NAME).unwrap();
    assert_eq!(pc.value, 100);
    assert!(!cluster.calls().iter().any(|c| c.kind == "KubeVirt"));
}

// ============================================================================
// Config map
// ============================================================================

fn tamper_config_map(cluster: &FakeCluster) {
    let mut cm: ConfigMap = cluster.object(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME).unwrap();
    let data = cm.data.get_or_insert_with(BTreeMap::new);
    data.insert(SELINUX_LAUNCHER_TYPE_KEY.to_string(), "spc_t".to_string());
    data.insert(MIGRATIONS_CONFIG_KEY.to_string(), "{\"bandwidth\": \"64Mi\"}".to_string());
    cluster.put(&cm);
}

#[tokio::test]
async fn test_config_map_admin_values_survive_outside_upgrade() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;
    tamper_config_map(&cluster);

    let mut req = OperandRequest::new(&hc, &env).with_upgrade_mode(false);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    assert_eq!(report.results[0].outcome, ChangeOutcome::Unchanged);
    assert!(cluster.mutations().is_empty());
    let cm: ConfigMap = cluster.object(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME).unwrap();
    assert_eq!(cm.data.unwrap()[SELINUX_LAUNCHER_TYPE_KEY], "spc_t");
}

#[tokio::test]
async fn test_config_map_labels_are_restored_outside_upgrade() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut cm: ConfigMap = cluster.object(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME).unwrap();
    let expected_labels = cm.metadata.labels.clone();
    let labels = cm.labels_mut();
    labels.clear();
    labels.insert("team".to_string(), "virt".to_string());
    cluster.put(&cm);

    let mut req = OperandRequest::new(&hc, &env).with_upgrade_mode(false);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    assert_eq!(report.results[0].outcome, ChangeOutcome::Updated);
    assert_eq!(
        cluster.mutations(),
        vec![call(Op::Update, "ConfigMap", KUBEVIRT_CONFIG_NAME)]
    );
    let cm: ConfigMap = cluster.object(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME).unwrap();
    assert_eq!(cm.metadata.labels, expected_labels);
}

#[tokio::test]
async fn test_config_map_is_forced_during_upgrade() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;
    tamper_config_map(&cluster);

    let mut req = OperandRequest::new(&hc, &env)
        .with_upgrade_mode(true)
        .with_hco_triggered(false);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    // Config map corrections are never attributed as overwrites
    assert_eq!(report.results[0].outcome, ChangeOutcome::Updated);
    assert_eq!(
        cluster.mutations(),
        vec![call(Op::Update, "ConfigMap", KUBEVIRT_CONFIG_NAME)]
    );

    let data = cluster
        .object::<ConfigMap>(Some(NAMESPACE), KUBEVIRT_CONFIG_NAME)
        .unwrap()
        .data
        .unwrap();
    assert_eq!(data[SELINUX_LAUNCHER_TYPE_KEY], SELINUX_LAUNCHER_TYPE);
    assert!(!data.contains_key(MIGRATIONS_CONFIG_KEY));
}

#[tokio::test]
async fn test_feature_gate_change_updates_config_map_and_kubevirt() {
    let cluster = FakeCluster::default();
    let mut hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    hc.spec.feature_gates = Some(HyperConvergedFeatureGates {
        hotplug_volumes: Some(true),
        ..Default::default()
    });
    let mut req = OperandRequest::new(&hc, &env);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();

    assert_eq!(report.results[0].outcome, ChangeOutcome::Updated);
    assert_eq!(report.results[2].outcome, ChangeOutcome::Updated);

    let kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    let gates = kv.spec.configuration.developer_configuration.unwrap().feature_gates;
    assert!(gates.contains(&"HotplugVolumes".to_string()));
}

// ============================================================================
// KubeVirt
// ============================================================================

#[tokio::test]
async fn test_kubevirt_drift_attribution() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    for (hco_triggered, expected) in [
        (false, ChangeOutcome::Overwritten),
        (true, ChangeOutcome::Updated),
    ] {
        let mut kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
        kv.spec.configuration.machine_type = Some("tampered".to_string());
        cluster.put(&kv);

        let mut req = OperandRequest::new(&hc, &env).with_hco_triggered(hco_triggered);
        let report = reconcile_operands(&cluster, &mut req).await.unwrap();
        assert_eq!(report.results[2].outcome, expected);

        let kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
        assert!(kv.spec.configuration.machine_type.is_none());
    }
}

#[tokio::test]
async fn test_kubevirt_update_keeps_live_metadata_and_status() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    kv.status = Some(healthy_status("v0.36.0"));
    kv.spec.uninstall_strategy = None;
    cluster.put(&kv);

    let mut req = OperandRequest::new(&hc, &env);
    reconcile_operands(&cluster, &mut req).await.unwrap();

    let kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    assert!(kv.spec.uninstall_strategy.is_some());
    assert_eq!(kv.status, Some(healthy_status("v0.36.0")));
    assert_eq!(kv.owner_references().len(), 1);
    assert_eq!(kv.resource_version().as_deref(), Some("1"));
}

#[tokio::test]
async fn test_kubevirt_fields_outside_the_model_are_preserved() {
    let cluster = FakeCluster::default();
    let mut hc = hco();
    hc.metadata.annotations = Some(BTreeMap::from([(
        JSON_PATCH_KV_ANNOTATION.to_string(),
        r#"[{"op": "add", "path": "/spec/imagePullPolicy", "value": "Always"}]"#.to_string(),
    )]));
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    assert_eq!(kv.spec.extra["imagePullPolicy"], "Always");

    // Fields defaulted by virt-operator do not count as drift
    kv.spec
        .extra
        .insert("certificateRotateStrategy".to_string(), serde_json::json!({}));
    cluster.put(&kv);

    let mut req = OperandRequest::new(&hc, &env);
    let report = reconcile_operands(&cluster, &mut req).await.unwrap();
    assert!(!report.any_changed());
    assert!(cluster.mutations().is_empty());

    // and survive the update that corrects real drift
    kv.spec.configuration.machine_type = Some("tampered".to_string());
    cluster.put(&kv);

    let mut req = OperandRequest::new(&hc, &env);
    reconcile_operands(&cluster, &mut req).await.unwrap();

    let kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    assert!(kv.spec.configuration.machine_type.is_none());
    assert_eq!(kv.spec.extra["imagePullPolicy"], "Always");
    assert_eq!(kv.spec.extra["certificateRotateStrategy"], serde_json::json!({}));
}

#[tokio::test]
async fn test_malformed_override_stops_before_kubevirt() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv {
        kvm_emulation: Some("maybe".to_string()),
        ..Default::default()
    };
    let mut req = OperandRequest::new(&hc, &env);

    let err = reconcile_operands(&cluster, &mut req).await.unwrap_err();
    assert!(matches!(err, Error::EnvDecode { .. }));
    assert_eq!(
        cluster.mutations(),
        vec![
            call(Op::Create, "ConfigMap", KUBEVIRT_CONFIG_NAME),
            call(Op::Create, "PriorityClass", KUBEVIRT_PRIORITY_CLASS_NAME),
        ]
    );
    assert!(!cluster.calls().iter().any(|c| c.kind == "KubeVirt"));
}

#[tokio::test]
async fn test_client_errors_propagate_unmodified() {
    let cluster = FakeCluster::default();
    let hc = hco();
    let env = OperandEnv::default();
    converge(&cluster, &hc, &env).await;

    let mut kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    kv.spec.configuration.machine_type = Some("tampered".to_string());
    cluster.put(&kv);
    cluster.fail_next::<KubeVirt>(Op::Update, 409);

    let mut req = OperandRequest::new(&hc, &env);
    let err = reconcile_operands(&cluster, &mut req).await.unwrap_err();
    assert!(err.is_conflict());
}

// ============================================================================
// Upgrade
// ============================================================================

#[tokio::test]
async fn test_upgrade_completes_when_kubevirt_is_ready_at_version() {
    let cluster = FakeCluster::default();
    let mut hc = hco();
    hc.status = Some(HyperConvergedStatus {
        versions: vec![Version {
            name: OPERATOR_VERSION_NAME.to_string(),
            version: "1.3.0".to_string(),
        }],
        observed_generation: Some(1),
        ..Default::default()
    });
    let env = OperandEnv {
        operator_version: Some("1.4.0".to_string()),
        kubevirt_version: Some("v0.36.0".to_string()),
        ..Default::default()
    };
    converge(&cluster, &hc, &env).await;

    let mut kv: KubeVirt = cluster.object(Some(NAMESPACE), &kubevirt_name()).unwrap();
    kv.status = Some(healthy_status("v0.35.0"));
    cluster.put(&kv);

    let outcome = run_pass(&cluster, &hc, &env).await;
    assert!(outcome.upgrade_mode);
    assert!(!outcome.result.as_ref().unwrap().all_upgrade_done());
    assert_eq!(outcome.status.version(OPERATOR_VERSION_NAME), Some("1.3.0"));

    kv.status = Some(healthy_status("v0.36.0"));
    cluster.put(&kv);

    let outcome = run_pass(&cluster, &hc, &env).await;
    assert!(outcome.result.as_ref().unwrap().all_upgrade_done());
    assert_eq!(outcome.status.version(OPERATOR_VERSION_NAME), Some("1.4.0"));

    let conditions = ConditionSet::from_existing(&outcome.status.conditions);
    assert!(conditions.is_status(CONDITION_AVAILABLE, STATUS_TRUE));
    assert!(conditions.is_status(CONDITION_RECONCILE_COMPLETE, STATUS_TRUE));
    assert_eq!(outcome.status.related_objects.len(), Operand::ALL.len());
}

#[tokio::test]
async fn test_failed_pass_reports_reconcile_failure() {
    let cluster = FakeCluster::default();
    let hc = hco();
    cluster.fail_next::<ConfigMap>(Op::Get, 503);

    let outcome = run_pass(&cluster, &hc, &OperandEnv::default()).await;

    assert_eq!(outcome.result.as_ref().unwrap_err().api_code(), Some(503));
    assert!(outcome.status.related_objects.is_empty());
    let conditions = ConditionSet::from_existing(&outcome.status.conditions);
    assert!(conditions.is_status(CONDITION_RECONCILE_COMPLETE, STATUS_FALSE));
    assert_eq!(cluster.calls().len(), 1);
}
