//! Runs against the cluster in the current kubeconfig. Needs the `Free5GC`
//! CRD installed (`cargo run --bin crdgen | kubectl apply -f -`).

mod common;

use common::{component, uniq};
use f5gc_operator::controller::{Outcome, ReconcileSettings, Reconciler};
use f5gc_operator::crd::{Free5GC, Free5GCSpec};
use f5gc_operator::store::{KubeStore, ObjectKey, ResourceStore};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    Client,
    api::{Api, DeleteParams, PostParams},
};

#[test_log::test(tokio::test)]
#[ignore]
async fn converges_and_cleans_up_on_a_real_cluster() {
    let _ = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    );
    let client = Client::try_default().await.expect("kube client");
    let ns = "default";
    let name = uniq("f5gc");

    let api: Api<Free5GC> = Api::namespaced(client.clone(), ns);
    let spec = Free5GCSpec {
        nrf: component("free5gc/nrf:v3.4.3"),
        ..Default::default()
    };
    api.create(&PostParams::default(), &Free5GC::new(&name, spec))
        .await
        .expect("create Free5GC");

    let r = Reconciler::new(
        KubeStore::new(client.clone(), "f5gc-operator-it"),
        ReconcileSettings::default(),
    );
    let key = ObjectKey::new(ns, &name);
    let outcome = r.reconcile_object(&key).await.expect("first pass");
    assert!(matches!(outcome, Outcome::Converged { .. }));

    let dep_key = ObjectKey::new(ns, format!("{name}-nrf"));
    assert!(r.store().get::<Deployment>(&dep_key).await.unwrap().is_some());
    assert!(r.store().get::<Service>(&dep_key).await.unwrap().is_some());

    api.delete(&name, &DeleteParams::default())
        .await
        .expect("delete Free5GC");
    let mut finalized = false;
    for _ in 0..30 {
        match r.reconcile_object(&key).await.expect("cleanup pass") {
            Outcome::Finalized | Outcome::NotFound => {
                finalized = true;
                break;
            }
            _ => tokio::time::sleep(std::time::Duration::from_secs(1)).await,
        }
    }
    assert!(finalized, "finalizer was never released");
    assert!(r.store().get::<Deployment>(&dep_key).await.unwrap().is_none());
}
