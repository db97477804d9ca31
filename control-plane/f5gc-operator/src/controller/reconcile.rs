use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use super::engine::{Applied, ApplyOutcome, converge_all, prune_orphans};
use super::lifecycle::{
    LifecycleState, attach_finalizer, cleanup_owned, detach_finalizer,
};
use super::status::{build_status, observe, status_patch};
use crate::config::OperatorConfig;
use crate::crd::Free5GC;
use crate::store::{ObjectKey, ResourceStore, StoreError};
use crate::templates::{
    BuildDefaults, ConfigError, RenderContext, build_desired_state,
};

#[derive(thiserror::Error, Debug)]
pub enum ReconcileErr {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid spec: {0}")]
    Config(#[from] ConfigError),
}

impl ReconcileErr {
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileErr::Store(_) => "ReconcileFailed",
            ReconcileErr::Config(_) => "InvalidSpec",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    pub pending_requeue: Duration,
    pub cleanup_requeue: Duration,
    pub defaults: BuildDefaults,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            pending_requeue: Duration::from_secs(10),
            cleanup_requeue: Duration::from_secs(5),
            defaults: BuildDefaults::default(),
        }
    }
}

impl From<&OperatorConfig> for ReconcileSettings {
    fn from(cfg: &OperatorConfig) -> Self {
        Self {
            pending_requeue: cfg.requeue.pending(),
            cleanup_requeue: cfg.requeue.cleanup(),
            defaults: BuildDefaults {
                database_image: cfg.default_database_image.clone(),
            },
        }
    }
}

/// What a single pass did.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The object no longer exists.
    NotFound,
    /// Deleting, but the finalizer is not ours to act on.
    Released,
    /// Cleanup issued; owned resources are still terminating.
    AwaitingCleanup,
    /// Cleanup confirmed and the finalizer removed.
    Finalized,
    Converged {
        applied: Vec<Applied>,
        pruned: Vec<String>,
        pending: bool,
        status_written: bool,
    },
}

impl Outcome {
    /// Resources created or updated during the pass.
    pub fn changes(&self) -> Vec<&Applied> {
        match self {
            Outcome::Converged { applied, .. } => applied
                .iter()
                .filter(|a| a.outcome != ApplyOutcome::Unchanged)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Drives one `Free5GC` object towards its desired state through a
/// [`ResourceStore`].
pub struct Reconciler<S> {
    store: S,
    settings: ReconcileSettings,
}

impl<S: ResourceStore> Reconciler<S> {
    pub fn new(store: S, settings: ReconcileSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Converge the object identified by `key`; the returned duration asks
    /// for a follow-up pass, `None` means wait for the next change.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<Duration>, ReconcileErr> {
        let outcome = self.reconcile_object(key).await?;
        Ok(self.requeue_after(&outcome))
    }

    pub fn requeue_after(&self, outcome: &Outcome) -> Option<Duration> {
        match outcome {
            Outcome::AwaitingCleanup => Some(self.settings.cleanup_requeue),
            Outcome::Converged { pending: true, .. } => {
                Some(self.settings.pending_requeue)
            }
            _ => None,
        }
    }

    #[instrument(skip(self), fields(ns = %key.namespace, name = %key.name))]
    pub async fn reconcile_object(
        &self,
        key: &ObjectKey,
    ) -> Result<Outcome, ReconcileErr> {
        // always work from the latest persisted copy
        let Some(obj) = self.store.get::<Free5GC>(key).await? else {
            debug!("object gone; nothing to do");
            return Ok(Outcome::NotFound);
        };

        match LifecycleState::of(&obj) {
            LifecycleState::Deleting { finalized: false } => Ok(Outcome::Released),
            LifecycleState::Deleting { finalized: true } => {
                if !cleanup_owned(&self.store, &key.namespace, &key.name).await? {
                    return Ok(Outcome::AwaitingCleanup);
                }
                detach_finalizer(&self.store, &obj).await?;
                info!("cleanup confirmed; finalizer removed");
                Ok(Outcome::Finalized)
            }
            state => self.converge(key, obj, state).await,
        }
    }

    async fn converge(
        &self,
        key: &ObjectKey,
        obj: Free5GC,
        state: LifecycleState,
    ) -> Result<Outcome, ReconcileErr> {
        // validate before the first write so a bad spec never mutates anything
        let descriptors = build_desired_state(&key.name, &obj.spec, &self.settings.defaults)
            .inspect_err(|e| warn!(error = %e, "rejecting spec"))?;

        let obj = if state == LifecycleState::ActiveNoFinalizer {
            attach_finalizer(&self.store, &obj).await?
        } else {
            obj
        };

        let ctx = RenderContext {
            namespace: &key.namespace,
            owner_ref: obj.controller_owner_ref(&()),
        };
        let applied = converge_all(&self.store, &descriptors, &ctx).await?;
        let pruned =
            prune_orphans(&self.store, &key.namespace, &key.name, &descriptors)
                .await?;

        let observed = observe(&self.store, &key.namespace, &descriptors).await?;
        let pending = observed.any_pending();
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let next = build_status(
            obj.status.as_ref(),
            observed,
            obj.meta().generation,
            &now,
        );
        let status_written =
            match status_patch(obj.status.as_ref(), &next).map_err(StoreError::from)? {
                Some(patch) => {
                    self.store.patch_status::<Free5GC>(key, &patch).await?;
                    true
                }
                None => false,
            };

        debug!(
            applied = applied.len(),
            pruned = pruned.len(),
            pending,
            status_written,
            finalizer = ?obj.finalizers(),
            "pass complete"
        );
        Ok(Outcome::Converged {
            applied,
            pruned,
            pending,
            status_written,
        })
    }
}
