use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Service};
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::crd::Free5GC;
use crate::store::{Managed, ObjectKey, ResourceStore, StoreError};
use crate::templates::owner_selector;

pub const FINALIZER: &str = "core.free5gc.org/finalizer";

/// Where an object sits in the finalizer protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Live, finalizer not yet attached.
    ActiveNoFinalizer,
    /// Live and protected by the finalizer.
    ActiveFinalized,
    /// Deletion requested; `finalized` tells whether cleanup still gates it.
    Deleting { finalized: bool },
}

impl LifecycleState {
    pub fn of(obj: &Free5GC) -> Self {
        let finalized = has_finalizer(obj);
        match (obj.meta().deletion_timestamp.is_some(), finalized) {
            (true, finalized) => LifecycleState::Deleting { finalized },
            (false, true) => LifecycleState::ActiveFinalized,
            (false, false) => LifecycleState::ActiveNoFinalizer,
        }
    }
}

pub fn has_finalizer(obj: &Free5GC) -> bool {
    obj.finalizers().iter().any(|f| f == FINALIZER)
}

/// Append the finalizer, keeping any set by others.
pub async fn attach_finalizer<S: ResourceStore>(
    store: &S,
    obj: &Free5GC,
) -> Result<Free5GC, StoreError> {
    let mut finals = obj.finalizers().to_vec();
    finals.push(FINALIZER.to_string());
    let patch = json!({"metadata": {"finalizers": finals}});
    let updated = store.patch_merge(&ObjectKey::of(obj), &patch).await?;
    debug!(name = %obj.name_any(), "finalizer attached");
    Ok(updated)
}

/// Drop our finalizer; other finalizers stay.
pub async fn detach_finalizer<S: ResourceStore>(
    store: &S,
    obj: &Free5GC,
) -> Result<(), StoreError> {
    let finals: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != FINALIZER)
        .cloned()
        .collect();
    let patch = if finals.is_empty() {
        json!({"metadata": {"finalizers": null}})
    } else {
        json!({"metadata": {"finalizers": finals}})
    };
    store
        .patch_merge::<Free5GC>(&ObjectKey::of(obj), &patch)
        .await?;
    debug!(name = %obj.name_any(), "finalizer removed");
    Ok(())
}

async fn remaining<S: ResourceStore, K: Managed>(
    store: &S,
    namespace: &str,
    selector: &str,
) -> Result<usize, StoreError> {
    Ok(store.list::<K>(namespace, selector).await?.len())
}

/// Foreground-delete every owned Deployment, Service and claim, then list
/// again. Returns true only when nothing owned is left.
pub async fn cleanup_owned<S: ResourceStore>(
    store: &S,
    namespace: &str,
    owner: &str,
) -> Result<bool, StoreError> {
    let selector = owner_selector(owner);
    store
        .delete_collection::<Deployment>(namespace, &selector)
        .await?;
    store
        .delete_collection::<Service>(namespace, &selector)
        .await?;
    store
        .delete_collection::<PersistentVolumeClaim>(namespace, &selector)
        .await?;

    let left = remaining::<S, Deployment>(store, namespace, &selector).await?
        + remaining::<S, Service>(store, namespace, &selector).await?
        + remaining::<S, PersistentVolumeClaim>(store, namespace, &selector)
            .await?;
    if left > 0 {
        info!(%namespace, %owner, left, "owned resources still terminating");
    }
    Ok(left == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::Free5GCSpec;
    use crate::store::MemoryStore;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn f5gc(finalizers: Option<Vec<String>>) -> Free5GC {
        let mut obj = Free5GC::new("core", Free5GCSpec::default());
        obj.metadata.namespace = Some("5gc".into());
        obj.metadata.finalizers = finalizers;
        obj
    }

    fn owned<K: Default + Resource<DynamicType = ()>>(name: &str, owner: &str) -> K {
        let mut k = K::default();
        *k.meta_mut() = ObjectMeta {
            name: Some(name.into()),
            namespace: Some("5gc".into()),
            labels: Some(BTreeMap::from([(
                crate::templates::render::OWNER_LABEL.to_string(),
                owner.to_string(),
            )])),
            ..Default::default()
        };
        k
    }

    #[test]
    fn state_follows_deletion_and_finalizer() {
        assert_eq!(LifecycleState::of(&f5gc(None)), LifecycleState::ActiveNoFinalizer);
        let fin = f5gc(Some(vec![FINALIZER.into()]));
        assert_eq!(LifecycleState::of(&fin), LifecycleState::ActiveFinalized);
        let mut deleting = fin.clone();
        deleting.metadata.deletion_timestamp = Some(
            k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
                "2024-01-01T00:00:00Z".parse().unwrap(),
            ),
        );
        assert_eq!(
            LifecycleState::of(&deleting),
            LifecycleState::Deleting { finalized: true }
        );
    }

    #[tokio::test]
    async fn attach_and_detach_keep_foreign_finalizers() {
        let store = MemoryStore::new();
        let obj = store
            .create(&f5gc(Some(vec!["other/keep".into()])))
            .await
            .unwrap();
        let obj = attach_finalizer(&store, &obj).await.unwrap();
        assert_eq!(obj.finalizers(), &["other/keep".to_string(), FINALIZER.to_string()]);

        detach_finalizer(&store, &obj).await.unwrap();
        let obj: Free5GC = store.get(&ObjectKey::of(&obj)).await.unwrap().unwrap();
        assert_eq!(obj.finalizers(), &["other/keep".to_string()]);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_the_owners_resources() {
        let store = MemoryStore::new();
        store.create(&owned::<Deployment>("core-amf", "core")).await.unwrap();
        store.create(&owned::<Service>("core-amf", "core")).await.unwrap();
        store
            .create(&owned::<PersistentVolumeClaim>("core-mongodb", "core"))
            .await
            .unwrap();
        store.create(&owned::<Deployment>("edge-amf", "edge")).await.unwrap();
        store.create(&owned::<ConfigMap>("core-cfg", "core")).await.unwrap();

        assert!(cleanup_owned(&store, "5gc", "core").await.unwrap());
        assert!(!store.contains::<Deployment>(&ObjectKey::new("5gc", "core-amf")).await);
        assert!(
            !store
                .contains::<PersistentVolumeClaim>(&ObjectKey::new("5gc", "core-mongodb"))
                .await
        );
        assert!(store.contains::<Deployment>(&ObjectKey::new("5gc", "edge-amf")).await);
        assert!(store.contains::<ConfigMap>(&ObjectKey::new("5gc", "core-cfg")).await);
    }

    #[tokio::test]
    async fn cleanup_reports_resources_still_terminating() {
        let store = MemoryStore::new();
        let mut dep = owned::<Deployment>("core-amf", "core");
        dep.metadata.finalizers = Some(vec!["foregroundDeletion".into()]);
        store.create(&dep).await.unwrap();

        assert!(!cleanup_owned(&store, "5gc", "core").await.unwrap());
    }
}
