use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaim, PodSpec, ResourceRequirements,
    SecurityContext, Service,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;
use tracing::{debug, info, instrument};

use crate::store::{Managed, ObjectKey, ResourceStore, StoreError};
use crate::templates::network::{NETWORKS_ANNOTATION, set_networks_annotation};
use crate::templates::quantity::same_quantity;
use crate::templates::{
    RenderContext, RenderedResource, WorkloadDescriptor, owner_selector, render,
};

/// Result of converging one child resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

impl ApplyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplyOutcome::Created => "created",
            ApplyOutcome::Updated => "updated",
            ApplyOutcome::Unchanged => "unchanged",
        }
    }
}

/// Objects whose operator-owned fields can be folded into a live copy
/// without touching what other controllers or users set.
pub trait OwnedFields: Managed {
    fn merge_owned(&mut self, desired: &Self);
}

fn merge_metadata(live: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(want) = desired.labels.as_ref() {
        live.labels
            .get_or_insert_with(Default::default)
            .extend(want.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    for owner in desired.owner_references.iter().flatten() {
        let refs = live.owner_references.get_or_insert_with(Vec::new);
        match refs.iter_mut().find(|r| r.uid == owner.uid) {
            Some(existing) => *existing = owner.clone(),
            None => refs.push(owner.clone()),
        }
    }
}

fn same_quantities(
    a: Option<&BTreeMap<String, Quantity>>,
    b: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let (a, b) = (a.unwrap_or(&empty), b.unwrap_or(&empty));
    a.len() == b.len()
        && a.iter().all(|(k, q)| b.get(k).is_some_and(|o| same_quantity(q, o)))
}

/// Requests as the API server stores them: any resource with a limit but
/// no request gets the limit as its request.
fn effective_requests(r: &ResourceRequirements) -> BTreeMap<String, Quantity> {
    let mut requests = r.requests.clone().unwrap_or_default();
    for (k, q) in r.limits.iter().flatten() {
        requests.entry(k.clone()).or_insert_with(|| q.clone());
    }
    requests
}

/// Compares resource requirements by amount, after server defaulting.
fn same_resources(
    live: Option<&ResourceRequirements>,
    desired: Option<&ResourceRequirements>,
) -> bool {
    let empty = ResourceRequirements::default();
    let (live, desired) = (live.unwrap_or(&empty), desired.unwrap_or(&empty));
    live.claims == desired.claims
        && same_quantities(live.limits.as_ref(), desired.limits.as_ref())
        && same_quantities(
            Some(&effective_requests(live)),
            Some(&effective_requests(desired)),
        )
}

fn merge_container(live: &mut Container, desired: &Container) {
    live.image = desired.image.clone();
    if !same_resources(live.resources.as_ref(), desired.resources.as_ref()) {
        live.resources = desired.resources.clone();
    }
    live.env = desired.env.clone();

    let want = desired
        .security_context
        .as_ref()
        .and_then(|s| s.capabilities.as_ref())
        .and_then(|c| c.add.clone());
    match want {
        Some(add) => {
            live.security_context
                .get_or_insert_with(SecurityContext::default)
                .capabilities
                .get_or_insert_with(Default::default)
                .add = Some(add);
        }
        None => {
            if let Some(caps) = live
                .security_context
                .as_mut()
                .and_then(|s| s.capabilities.as_mut())
            {
                caps.add = None;
            }
        }
    }

    if desired.ports.is_some() {
        live.ports = desired.ports.clone();
    }
    for mount in desired.volume_mounts.iter().flatten() {
        let mounts = live.volume_mounts.get_or_insert_with(Vec::new);
        match mounts.iter_mut().find(|m| m.name == mount.name) {
            Some(existing) => *existing = mount.clone(),
            None => mounts.push(mount.clone()),
        }
    }
}

fn merge_pod(live: &mut PodSpec, desired: &PodSpec) {
    for want in &desired.containers {
        match live.containers.iter_mut().find(|c| c.name == want.name) {
            Some(c) => merge_container(c, want),
            None => live.containers.push(want.clone()),
        }
    }
    for vol in desired.volumes.iter().flatten() {
        let vols = live.volumes.get_or_insert_with(Vec::new);
        match vols.iter_mut().find(|v| v.name == vol.name) {
            Some(existing) => *existing = vol.clone(),
            None => vols.push(vol.clone()),
        }
    }
}

impl OwnedFields for Deployment {
    fn merge_owned(&mut self, desired: &Self) {
        merge_metadata(&mut self.metadata, &desired.metadata);
        let Some(want) = desired.spec.as_ref() else {
            return;
        };
        let Some(spec) = self.spec.as_mut() else {
            self.spec = Some(want.clone());
            return;
        };
        // selector is immutable once created
        spec.replicas = want.replicas;

        let want_meta = want.template.metadata.as_ref();
        let tmpl_meta = spec.template.metadata.get_or_insert_with(Default::default);
        if let Some(labels) = want_meta.and_then(|m| m.labels.as_ref()) {
            tmpl_meta
                .labels
                .get_or_insert_with(Default::default)
                .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let networks = want_meta
            .and_then(|m| m.annotations.as_ref())
            .and_then(|a| a.get(NETWORKS_ANNOTATION))
            .map(String::as_str);
        set_networks_annotation(&mut tmpl_meta.annotations, networks);

        match (spec.template.spec.as_mut(), want.template.spec.as_ref()) {
            (Some(pod), Some(want_pod)) => merge_pod(pod, want_pod),
            (None, Some(want_pod)) => spec.template.spec = Some(want_pod.clone()),
            _ => {}
        }
    }
}

impl OwnedFields for Service {
    fn merge_owned(&mut self, desired: &Self) {
        merge_metadata(&mut self.metadata, &desired.metadata);
        let Some(want) = desired.spec.as_ref() else {
            return;
        };
        // clusterIP and the remaining ServiceSpec fields belong to the API server
        let spec = self.spec.get_or_insert_with(Default::default);
        spec.selector = want.selector.clone();
        spec.ports = want.ports.clone();
    }
}

impl OwnedFields for PersistentVolumeClaim {
    fn merge_owned(&mut self, desired: &Self) {
        merge_metadata(&mut self.metadata, &desired.metadata);
        let Some(want) = desired
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"))
        else {
            return;
        };
        let live = self
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"));
        if live.is_some_and(|q| same_quantity(q, want)) {
            return;
        }
        // access modes and storage class are fixed at creation
        self.spec
            .get_or_insert_with(Default::default)
            .resources
            .get_or_insert_with(Default::default)
            .requests
            .get_or_insert_with(Default::default)
            .insert("storage".to_string(), want.clone());
    }
}

/// Create `desired` when absent, otherwise fold its owned fields into the
/// live object and replace only when that changed something.
#[instrument(level = "debug", skip_all, fields(kind = %K::kind(&()), name = %desired.name_any()))]
pub async fn apply<S, K>(store: &S, desired: &K) -> Result<ApplyOutcome, StoreError>
where
    S: ResourceStore,
    K: OwnedFields,
{
    let key = ObjectKey::of(desired);
    let Some(live) = store.get::<K>(&key).await? else {
        store.create(desired).await?;
        return Ok(ApplyOutcome::Created);
    };

    let mut merged = live.clone();
    merged.merge_owned(desired);
    if serde_json::to_value(&merged)? == serde_json::to_value(&live)? {
        return Ok(ApplyOutcome::Unchanged);
    }
    store.replace(&merged).await?;
    Ok(ApplyOutcome::Updated)
}

async fn apply_rendered<S: ResourceStore>(
    store: &S,
    res: &RenderedResource,
) -> Result<(&'static str, String, ApplyOutcome), StoreError> {
    Ok(match res {
        RenderedResource::Claim(pvc) => {
            ("PersistentVolumeClaim", pvc.name_any(), apply(store, pvc).await?)
        }
        RenderedResource::Deployment(dep) => {
            ("Deployment", dep.name_any(), apply(store, dep).await?)
        }
        RenderedResource::Service(svc) => {
            ("Service", svc.name_any(), apply(store, svc).await?)
        }
    })
}

/// One converged child resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    pub kind: &'static str,
    pub name: String,
    pub outcome: ApplyOutcome,
}

/// Converge every descriptor in order. The first failure aborts the pass;
/// whatever was applied before it stays applied.
pub async fn converge_all<S: ResourceStore>(
    store: &S,
    descriptors: &[WorkloadDescriptor],
    ctx: &RenderContext<'_>,
) -> Result<Vec<Applied>, StoreError> {
    let mut applied = Vec::new();
    for desc in descriptors {
        for res in render(desc, ctx) {
            let (kind, name, outcome) = apply_rendered(store, &res).await?;
            if outcome == ApplyOutcome::Unchanged {
                debug!(component = %desc.component, kind, %name, "unchanged");
            } else {
                info!(component = %desc.component, kind, %name, outcome = outcome.as_str(), "applied");
            }
            applied.push(Applied {
                kind,
                name,
                outcome,
            });
        }
    }
    Ok(applied)
}

async fn prune_kind<S, K>(
    store: &S,
    namespace: &str,
    owner: &str,
    keep: &BTreeSet<String>,
) -> Result<Vec<String>, StoreError>
where
    S: ResourceStore,
    K: Managed,
{
    let mut pruned = Vec::new();
    for obj in store.list::<K>(namespace, &owner_selector(owner)).await? {
        let name = obj.name_any();
        if keep.contains(&name) || obj.meta().deletion_timestamp.is_some() {
            continue;
        }
        store.delete::<K>(&ObjectKey::new(namespace, &name)).await?;
        info!(kind = %K::kind(&()), %name, "pruned orphan");
        pruned.push(name);
    }
    Ok(pruned)
}

/// Delete Deployments and Services carrying the owner label that are no
/// longer part of the desired state. Claims are left alone so data survives
/// a component being switched off.
pub async fn prune_orphans<S: ResourceStore>(
    store: &S,
    namespace: &str,
    owner: &str,
    descriptors: &[WorkloadDescriptor],
) -> Result<Vec<String>, StoreError> {
    let keep: BTreeSet<String> = descriptors.iter().map(|d| d.name()).collect();
    let mut pruned =
        prune_kind::<S, Deployment>(store, namespace, owner, &keep).await?;
    pruned.extend(prune_kind::<S, Service>(store, namespace, owner, &keep).await?);
    Ok(pruned)
}
