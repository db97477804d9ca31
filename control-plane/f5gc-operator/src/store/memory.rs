use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use super::{Managed, ObjectKey, ResourceStore, StoreError, key_for};

type Slot = (String, String, String);

#[derive(Default)]
struct Inner {
    objects: BTreeMap<Slot, Value>,
    next_uid: u64,
    next_version: u64,
    next_ip: u32,
    mutations: usize,
    fail_at: Option<usize>,
}

impl Inner {
    /// Gate every write: bumps the mutation counter or trips an armed
    /// failure. A tripped failure disarms itself.
    fn begin_mutation(&mut self) -> Result<(), StoreError> {
        if self.fail_at == Some(self.mutations + 1) {
            self.fail_at = None;
            return Err(StoreError::Unavailable(format!(
                "injected failure on mutation {}",
                self.mutations + 1
            )));
        }
        self.mutations += 1;
        Ok(())
    }

    fn bump_version(&mut self, obj: &mut Value) {
        self.next_version += 1;
        obj["metadata"]["resourceVersion"] =
            Value::String(self.next_version.to_string());
    }

    /// Drop an object whose deletion was requested once its last finalizer
    /// is gone. Returns true when the object was removed.
    fn finalize(&mut self, slot: &Slot) -> bool {
        let done = self.objects.get(slot).is_some_and(|obj| {
            obj["metadata"].get("deletionTimestamp").is_some()
                && finalizers(obj).is_empty()
        });
        if done {
            self.objects.remove(slot);
        }
        done
    }

    fn delete(&mut self, slot: &Slot) {
        let Some(obj) = self.objects.get_mut(slot) else {
            return;
        };
        if finalizers(obj).is_empty() {
            self.objects.remove(slot);
        } else if obj["metadata"].get("deletionTimestamp").is_none() {
            obj["metadata"]["deletionTimestamp"] = Value::String(now());
        }
    }
}

fn now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn finalizers(obj: &Value) -> Vec<&str> {
    obj["metadata"]["finalizers"]
        .as_array()
        .map(|f| f.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn slot<K: Managed>(key: &ObjectKey) -> Slot {
    (
        K::kind(&()).to_string(),
        key.namespace.clone(),
        key.name.clone(),
    )
}

/// Equality-based selector match (`k=v,k2=v2`), the only form this crate
/// issues.
fn matches_selector(obj: &Value, selector: &str) -> bool {
    let labels = &obj["metadata"]["labels"];
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).and_then(Value::as_str)
                == Some(v.trim()),
            None => labels.get(term).is_some(),
        })
}

/// RFC 7386 JSON merge patch: objects merge recursively, `null` deletes,
/// anything else replaces.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (k, v) in patch {
            if v.is_null() {
                target.remove(k);
            } else {
                merge_patch(target.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

/// In-process [`ResourceStore`] with API-server-like bookkeeping:
/// resourceVersion conflicts, status subresource separation, finalizer
/// gated deletion and Service cluster IP allocation. Writes can be made to
/// fail on demand to exercise partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th successful-to-be mutation counted from store creation
    /// (1-based). The failure fires once.
    pub async fn fail_mutation_at(&self, n: usize) {
        self.inner.lock().await.fail_at = Some(n);
    }

    /// Number of writes that went through.
    pub async fn mutation_count(&self) -> usize {
        self.inner.lock().await.mutations
    }

    /// Mark an object for deletion the way `kubectl delete` would.
    pub async fn request_deletion<K: Managed>(&self, key: &ObjectKey) {
        let mut inner = self.inner.lock().await;
        inner.delete(&slot::<K>(key));
    }

    /// Overwrite an object's status without counting as a mutation; stands
    /// in for the controllers that own those status fields.
    pub async fn set_status<K: Managed>(
        &self,
        key: &ObjectKey,
        status: Value,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let obj = inner
            .objects
            .get_mut(&slot::<K>(key))
            .ok_or_else(|| StoreError::not_found::<K>(key))?;
        obj["status"] = status;
        Ok(())
    }

    /// Every stored object keyed by `Kind/namespace/name`, minus the
    /// metadata the store itself churns.
    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .iter()
            .map(|((kind, ns, name), obj)| {
                let mut obj = obj.clone();
                if let Some(meta) = obj["metadata"].as_object_mut() {
                    for volatile in [
                        "resourceVersion",
                        "uid",
                        "generation",
                        "creationTimestamp",
                        "managedFields",
                    ] {
                        meta.remove(volatile);
                    }
                }
                (format!("{kind}/{ns}/{name}"), obj)
            })
            .collect()
    }

    pub async fn contains<K: Managed>(&self, key: &ObjectKey) -> bool {
        self.inner.lock().await.objects.contains_key(&slot::<K>(key))
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<K: Managed>(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<K>, StoreError> {
        let inner = self.inner.lock().await;
        inner
            .objects
            .get(&slot::<K>(key))
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(Into::into)
    }

    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_for(obj)?;
        let slot = slot::<K>(&key);
        let mut value = serde_json::to_value(obj)?;

        let mut inner = self.inner.lock().await;
        if inner.objects.contains_key(&slot) {
            return Err(StoreError::already_exists::<K>(&key));
        }
        inner.begin_mutation()?;

        inner.next_uid += 1;
        value["apiVersion"] = json!(K::api_version(&()));
        value["kind"] = json!(K::kind(&()));
        value["metadata"]["namespace"] = json!(key.namespace);
        value["metadata"]["uid"] = json!(format!("uid-{}", inner.next_uid));
        value["metadata"]["generation"] = json!(1);
        value["metadata"]["creationTimestamp"] = json!(now());
        if K::kind(&()) == "Service"
            && value["spec"].get("clusterIP").is_none_or(Value::is_null)
        {
            inner.next_ip += 1;
            value["spec"]["clusterIP"] = json!(format!(
                "10.96.{}.{}",
                inner.next_ip / 250,
                inner.next_ip % 250 + 1
            ));
        }
        inner.bump_version(&mut value);
        inner.objects.insert(slot, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = key_for(obj)?;
        let slot = slot::<K>(&key);
        let mut value = serde_json::to_value(obj)?;

        let mut inner = self.inner.lock().await;
        let Some(current) = inner.objects.get(&slot) else {
            return Err(StoreError::not_found::<K>(&key));
        };
        let stored_version = current["metadata"]["resourceVersion"].clone();
        match obj.meta().resource_version.as_deref() {
            Some(rv) if Some(rv) != stored_version.as_str() => {
                return Err(StoreError::conflict::<K>(&key));
            }
            _ => {}
        }
        let mut generation = current["metadata"]["generation"]
            .as_i64()
            .unwrap_or(1);
        if current.get("spec") != value.get("spec") {
            generation += 1;
        }
        // the main resource never writes status
        let status = current.get("status").cloned();
        let metadata = current["metadata"].clone();
        inner.begin_mutation()?;

        for immutable in ["uid", "creationTimestamp", "deletionTimestamp"] {
            match metadata.get(immutable) {
                Some(v) => value["metadata"][immutable] = v.clone(),
                None => {
                    if let Some(m) = value["metadata"].as_object_mut() {
                        m.remove(immutable);
                    }
                }
            }
        }
        value["metadata"]["generation"] = json!(generation);
        match status {
            Some(s) => value["status"] = s,
            None => {
                if let Some(m) = value.as_object_mut() {
                    m.remove("status");
                }
            }
        }
        inner.bump_version(&mut value);
        inner.objects.insert(slot.clone(), value.clone());
        inner.finalize(&slot);
        Ok(serde_json::from_value(value)?)
    }

    async fn list<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, StoreError> {
        let kind = K::kind(&());
        let inner = self.inner.lock().await;
        inner
            .objects
            .iter()
            .filter(|((k, ns, _), obj)| {
                k == kind.as_ref()
                    && ns == namespace
                    && matches_selector(obj, selector)
            })
            .map(|(_, obj)| serde_json::from_value(obj.clone()))
            .collect::<Result<Vec<K>, _>>()
            .map_err(Into::into)
    }

    async fn delete_collection<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), StoreError> {
        let kind = K::kind(&());
        let mut inner = self.inner.lock().await;
        inner.begin_mutation()?;
        let targets: Vec<Slot> = inner
            .objects
            .iter()
            .filter(|((k, ns, _), obj)| {
                k == kind.as_ref()
                    && ns == namespace
                    && matches_selector(obj, selector)
            })
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in &targets {
            inner.delete(slot);
        }
        Ok(())
    }

    async fn delete<K: Managed>(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let slot = slot::<K>(key);
        let mut inner = self.inner.lock().await;
        if !inner.objects.contains_key(&slot) {
            return Ok(());
        }
        inner.begin_mutation()?;
        inner.delete(&slot);
        Ok(())
    }

    async fn patch_merge<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let slot = slot::<K>(key);
        let mut inner = self.inner.lock().await;
        let Some(mut value) = inner.objects.get(&slot).cloned() else {
            return Err(StoreError::not_found::<K>(key));
        };
        let mut patch = patch.clone();
        if let Some(p) = patch.as_object_mut() {
            p.remove("status");
        }
        let spec_before = value.get("spec").cloned();
        merge_patch(&mut value, &patch);
        // validate before committing
        let typed: K = serde_json::from_value(value.clone())?;
        inner.begin_mutation()?;

        if value.get("spec").cloned() != spec_before {
            let generation =
                value["metadata"]["generation"].as_i64().unwrap_or(1) + 1;
            value["metadata"]["generation"] = json!(generation);
        }
        inner.bump_version(&mut value);
        inner.objects.insert(slot.clone(), value.clone());
        if inner.finalize(&slot) {
            return Ok(typed);
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn patch_status<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let slot = slot::<K>(key);
        let mut inner = self.inner.lock().await;
        let Some(mut value) = inner.objects.get(&slot).cloned() else {
            return Err(StoreError::not_found::<K>(key));
        };
        if let Some(status) = patch.get("status") {
            let mut current = value.get("status").cloned().unwrap_or(Value::Null);
            merge_patch(&mut current, status);
            value["status"] = current;
        }
        let typed: K = serde_json::from_value(value.clone())?;
        inner.begin_mutation()?;
        inner.bump_version(&mut value);
        inner.objects.insert(slot, value);
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn cm(name: &str, labels: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("ns".into()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        }
    }

    #[test]
    fn merge_patch_deletes_nulls_and_merges_objects() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge_patch(&mut target, &json!({"a": {"b": null, "e": 3}, "d": [2]}));
        assert_eq!(target, json!({"a": {"c": 2, "e": 3}, "d": [2]}));
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_assigns_identity() {
        let store = MemoryStore::new();
        let created = store.create(&cm("a", &[])).await.unwrap();
        assert_eq!(created.metadata.uid.as_deref(), Some("uid-1"));
        assert!(created.metadata.resource_version.is_some());
        let err = store.create(&cm("a", &[])).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        assert_eq!(store.mutation_count().await, 1);
    }

    #[tokio::test]
    async fn replace_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let first = store.create(&cm("a", &[])).await.unwrap();
        let mut updated = first.clone();
        updated.data = Some(BTreeMap::new());
        store.replace(&updated).await.unwrap();

        let err = store.replace(&first).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_label_selector() {
        let store = MemoryStore::new();
        store.create(&cm("a", &[("owner", "x")])).await.unwrap();
        store.create(&cm("b", &[("owner", "y")])).await.unwrap();
        let got: Vec<ConfigMap> = store.list("ns", "owner=x").await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].metadata.name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn services_get_a_stable_cluster_ip() {
        let store = MemoryStore::new();
        let svc = Service {
            metadata: ObjectMeta {
                name: Some("svc".into()),
                namespace: Some("ns".into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        let created = store.create(&svc).await.unwrap();
        let ip = created.spec.as_ref().and_then(|s| s.cluster_ip.clone());
        assert!(ip.is_some());
    }

    #[tokio::test]
    async fn finalizers_gate_deletion() {
        let store = MemoryStore::new();
        let mut obj = cm("a", &[]);
        obj.metadata.finalizers = Some(vec!["test/finalizer".into()]);
        store.create(&obj).await.unwrap();
        let key = ObjectKey::new("ns", "a");

        store.request_deletion::<ConfigMap>(&key).await;
        let pending: ConfigMap = store.get(&key).await.unwrap().unwrap();
        assert!(pending.metadata.deletion_timestamp.is_some());

        store
            .patch_merge::<ConfigMap>(
                &key,
                &json!({"metadata": {"finalizers": null}}),
            )
            .await
            .unwrap();
        assert!(!store.contains::<ConfigMap>(&key).await);
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let store = MemoryStore::new();
        store.fail_mutation_at(2).await;
        store.create(&cm("a", &[])).await.unwrap();
        let err = store.create(&cm("b", &[])).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.create(&cm("b", &[])).await.unwrap();
        assert_eq!(store.mutation_count().await, 2);
    }
}
