//! Typed cluster access for operand objects
//!
//! The reconciliation core talks to the cluster only through [`ClusterClient`]
//! so that it can be driven by the real API server or by an in-memory fake.

use std::fmt::Debug;

use async_trait::async_trait;
use kube::{
    api::{DeleteParams, DynamicObject, PostParams},
    core::ApiResource,
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Any statically typed Kubernetes object the operator manages
pub trait ManagedObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> ManagedObject for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Identity of an object within its kind
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// None for cluster-scoped objects
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace(),
            name: obj.name_any(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Typed get/create/update/delete against the cluster.
///
/// A missing object on `get` is `Ok(None)`; every other failure is returned
/// unmodified for the caller's requeue policy.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>>;

    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K>;

    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K>;

    async fn delete<K: ManagedObject>(&self, obj: &K) -> Result<()>;
}

/// [`ClusterClient`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Untyped API handle for K, so that namespaced and cluster-scoped kinds
    /// share one code path.
    fn api<K: ManagedObject>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        let api = self.api::<K>(key.namespace.as_deref());
        match api.get(&key.name).await {
            Ok(obj) => Ok(Some(from_dynamic(obj)?)),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!(kind = %K::kind(&()), %key, "Object not found");
                Ok(None)
            }
            Err(e) => Err(Error::Kube(e)),
        }
    }

    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        let api = self.api::<K>(obj.meta().namespace.as_deref());
        let created = api.create(&PostParams::default(), &to_dynamic(obj)?).await?;
        from_dynamic(created)
    }

    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        let api = self.api::<K>(obj.meta().namespace.as_deref());
        let updated = api
            .replace(&obj.name_any(), &PostParams::default(), &to_dynamic(obj)?)
            .await?;
        from_dynamic(updated)
    }

    async fn delete<K: ManagedObject>(&self, obj: &K) -> Result<()> {
        let api = self.api::<K>(obj.meta().namespace.as_deref());
        api.delete(&obj.name_any(), &DeleteParams::default()).await?;
        Ok(())
    }
}

fn to_dynamic<K: ManagedObject>(obj: &K) -> Result<DynamicObject> {
    let mut value = serde_json::to_value(obj)?;
    // k8s-openapi types always carry their type meta; derived CRs might not
    if let Some(map) = value.as_object_mut() {
        map.entry("apiVersion")
            .or_insert_with(|| K::api_version(&()).into_owned().into());
        map.entry("kind")
            .or_insert_with(|| K::kind(&()).into_owned().into());
    }
    Ok(serde_json::from_value(value)?)
}

fn from_dynamic<K: ManagedObject>(obj: DynamicObject) -> Result<K> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::api::scheduling::v1::PriorityClass;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_object_key_display() {
        let pc = PriorityClass {
            metadata: ObjectMeta {
                name: Some("kubevirt-cluster-critical".to_string()),
                ..Default::default()
            },
            value: 1,
            ..Default::default()
        };
        assert_eq!(ObjectKey::of(&pc).to_string(), "kubevirt-cluster-critical");

        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("kubevirt-config".to_string()),
                namespace: Some("kubevirt-hyperconverged".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            ObjectKey::of(&cm).to_string(),
            "kubevirt-hyperconverged/kubevirt-config"
        );
    }

    #[test]
    fn test_dynamic_conversion_keeps_data() {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("kubevirt-config".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "feature-gates".to_string(),
                "DataVolumes,SRIOV".to_string(),
            )])),
            ..Default::default()
        };

        let dynamic = to_dynamic(&cm).unwrap();
        assert_eq!(dynamic.types.as_ref().map(|t| t.kind.as_str()), Some("ConfigMap"));

        let back: ConfigMap = from_dynamic(dynamic).unwrap();
        assert_eq!(back, cm);
    }
}
