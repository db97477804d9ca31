pub mod engine;
pub mod events;
pub mod lifecycle;
pub mod reconcile;
pub mod status;

use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    Api, Client,
    runtime::{
        Controller,
        controller::Action,
        events::{Recorder, Reporter},
        watcher::Config,
    },
};
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::Free5GC;
use crate::store::{KubeStore, ObjectKey};
use crate::templates::render::{MANAGED_BY, MANAGED_BY_LABEL};

pub use engine::ApplyOutcome;
pub use lifecycle::{FINALIZER, LifecycleState};
pub use reconcile::{Outcome, ReconcileErr, ReconcileSettings, Reconciler};

pub struct ControllerContext {
    pub reconciler: Reconciler<KubeStore>,
    pub recorder: Option<Recorder>,
    pub error_requeue: Duration,
}

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

pub async fn run_controller(
    client: Client,
    cfg: OperatorConfig,
) -> anyhow::Result<()> {
    let ns = cfg.watch_namespace.as_deref();
    let api: Api<Free5GC> = scoped(&client, ns);

    let recorder = cfg.features.events().then(|| {
        Recorder::new(
            client.clone(),
            Reporter {
                controller: cfg.field_manager.clone(),
                instance: std::env::var("POD_NAME").ok(),
            },
        )
    });
    let ctx = Arc::new(ControllerContext {
        reconciler: Reconciler::new(
            KubeStore::new(client.clone(), cfg.field_manager.clone()),
            ReconcileSettings::from(&cfg),
        ),
        recorder,
        error_requeue: cfg.requeue.error(),
    });

    let mut controller = Controller::new(api, Config::default());
    if cfg.features.watch_children() {
        let deployments: Api<Deployment> = scoped(&client, ns);
        controller = controller.owns(
            deployments,
            Config::default().labels(&format!("{MANAGED_BY_LABEL}={MANAGED_BY}")),
        );
    }

    info!(namespace = ?ns, "starting Free5GC controller");
    controller
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj_ref, action)) => {
                    info!(name = %obj_ref.name, "reconciled: requeue={:?}", action)
                }
                Err(e) => error!(error = ?e, "reconcile error"),
            }
        })
        .await;

    Ok(())
}

async fn reconcile(
    obj: Arc<Free5GC>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileErr> {
    let key = ObjectKey::of(obj.as_ref());
    let result = ctx.reconciler.reconcile_object(&key).await;
    if let Some(recorder) = ctx.recorder.as_ref() {
        events::publish_outcome(recorder, &obj, &result).await;
    }
    Ok(match ctx.reconciler.requeue_after(&result?) {
        Some(after) => Action::requeue(after),
        None => Action::await_change(),
    })
}

fn error_policy(
    obj: Arc<Free5GC>,
    err: &ReconcileErr,
    ctx: Arc<ControllerContext>,
) -> Action {
    let key = ObjectKey::of(obj.as_ref());
    match err {
        ReconcileErr::Store(e) if e.is_transient() => {
            warn!(%key, error = %e, "transient store error; requeueing")
        }
        _ => error!(%key, error = %err, "reconcile failed; requeueing"),
    }
    Action::requeue(ctx.error_requeue)
}
