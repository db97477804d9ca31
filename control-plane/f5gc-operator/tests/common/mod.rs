#![allow(dead_code)]

use std::collections::BTreeMap;

use f5gc_operator::controller::{ReconcileSettings, Reconciler};
use f5gc_operator::crd::free5gc::{
    ComponentSpec, DatabaseSpec, NetworkAttachment, NetworkSpec, StorageSpec,
    UlclSpec, UpfInstance, UpfSpec,
};
use f5gc_operator::crd::{Free5GC, Free5GCSpec};
use f5gc_operator::store::{MemoryStore, ObjectKey, ResourceStore};
use f5gc_operator::templates::owner_selector;
use k8s_openapi::api::apps::v1::Deployment;
use serde_json::{Value, json};

pub const NS: &str = "5gc";

// DNS-1123 safe numeric suffix for unique names
pub const DIGITS: [char; 10] =
    ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
pub fn uniq(prefix: &str) -> String {
    format!("{prefix}-{}", nanoid::nanoid!(6, &DIGITS))
}

pub fn component(image: &str) -> Option<ComponentSpec> {
    Some(ComponentSpec {
        image: image.into(),
        ..Default::default()
    })
}

pub fn nad(name: &str) -> Option<NetworkAttachment> {
    Some(NetworkAttachment {
        name: name.into(),
        interface: name.into(),
        ..Default::default()
    })
}

pub fn ulcl(names: &[&str]) -> UlclSpec {
    UlclSpec {
        enabled: true,
        instances: names
            .iter()
            .map(|n| UpfInstance {
                name: n.to_string(),
                component: ComponentSpec {
                    image: "free5gc/upf:v3.4.3".into(),
                    ..Default::default()
                },
            })
            .collect(),
    }
}

/// Database with storage, a handful of core functions and a single UPF.
pub fn full_spec() -> Free5GCSpec {
    Free5GCSpec {
        database: Some(DatabaseSpec {
            storage: Some(StorageSpec {
                size: "8Gi".into(),
                storage_class_name: None,
            }),
            ..Default::default()
        }),
        nrf: component("free5gc/nrf:v3.4.3"),
        amf: component("free5gc/amf:v3.4.3"),
        smf: component("free5gc/smf:v3.4.3"),
        upf: Some(UpfSpec {
            image: "free5gc/upf:v3.4.3".into(),
            ..Default::default()
        }),
        network: NetworkSpec {
            n3_network: nad("n3net"),
            n4_network: nad("n4net"),
            n9_network: nad("n9net"),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn free5gc(name: &str, spec: Free5GCSpec) -> Free5GC {
    let mut obj = Free5GC::new(name, spec);
    obj.metadata.namespace = Some(NS.into());
    obj
}

pub fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NS, name)
}

pub fn reconciler() -> Reconciler<MemoryStore> {
    Reconciler::new(MemoryStore::new(), ReconcileSettings::default())
}

/// Reconciler whose store already holds `obj`.
pub async fn seeded(obj: &Free5GC) -> Reconciler<MemoryStore> {
    let r = reconciler();
    r.store().create(obj).await.unwrap();
    r
}

pub async fn fetch(r: &Reconciler<MemoryStore>, name: &str) -> Option<Free5GC> {
    r.store().get::<Free5GC>(&key(name)).await.unwrap()
}

/// Play the Deployment controller: report every owned workload as fully
/// rolled out.
pub async fn mark_ready(store: &MemoryStore, owner: &str) {
    let deps: Vec<Deployment> =
        store.list(NS, &owner_selector(owner)).await.unwrap();
    for dep in deps {
        let replicas = dep.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        store
            .set_status::<Deployment>(
                &ObjectKey::of(&dep),
                json!({"replicas": replicas, "readyReplicas": replicas}),
            )
            .await
            .unwrap();
    }
}

/// Snapshot with condition timestamps dropped, for comparing passes that
/// ran at different wall-clock times.
pub async fn stable_snapshot(store: &MemoryStore) -> BTreeMap<String, Value> {
    let mut snap = store.snapshot().await;
    for obj in snap.values_mut() {
        if let Some(conds) = obj["status"]["conditions"].as_array_mut() {
            for c in conds {
                if let Some(c) = c.as_object_mut() {
                    c.remove("lastTransitionTime");
                }
            }
        }
    }
    snap
}

pub fn names_of_kind(snap: &BTreeMap<String, Value>, kind: &str) -> Vec<String> {
    snap.keys()
        .filter_map(|k| k.strip_prefix(&format!("{kind}/{NS}/")).map(str::to_string))
        .collect()
}
