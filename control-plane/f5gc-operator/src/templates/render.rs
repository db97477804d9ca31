use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, ObjectFieldSelector, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, PodSpec,
    PodTemplateSpec, SecurityContext, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta, OwnerReference,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::descriptor::{ClaimRequest, EnvEntry, EnvSource, WorkloadDescriptor};
use super::network::set_networks_annotation;

pub const OWNER_LABEL: &str = "core.free5gc.org/owner";
pub const COMPONENT_LABEL: &str = "core.free5gc.org/component";
pub const INSTANCE_LABEL: &str = "core.free5gc.org/instance";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "f5gc-operator";

pub const DATABASE_VOLUME: &str = "mongodb-data";
pub const DATABASE_MOUNT_PATH: &str = "/data/db";

#[derive(Clone, Debug)]
pub struct RenderContext<'a> {
    pub namespace: &'a str,
    pub owner_ref: Option<OwnerReference>,
}

/// Rendered child resources in the order they must be converged.
#[derive(Clone, Debug)]
pub enum RenderedResource {
    Claim(PersistentVolumeClaim),
    Deployment(Deployment),
    Service(Service),
}

/// Label selector matching everything owned by one `Free5GC` object.
pub fn owner_selector(owner: &str) -> String {
    format!("{}={}", OWNER_LABEL, owner)
}

/// Labels identifying a workload's pods; doubles as the Service selector.
pub fn identity_labels(desc: &WorkloadDescriptor) -> BTreeMap<String, String> {
    let mut lbls = BTreeMap::new();
    lbls.insert("app".to_string(), desc.component.app_label().to_string());
    lbls.insert(OWNER_LABEL.to_string(), desc.owner.clone());
    lbls.insert(COMPONENT_LABEL.to_string(), desc.component.to_string());
    if let Some(instance) = desc.instance() {
        lbls.insert(INSTANCE_LABEL.to_string(), instance.to_string());
    }
    lbls
}

/// Identity labels plus bookkeeping labels set on the resources themselves.
pub fn resource_labels(desc: &WorkloadDescriptor) -> BTreeMap<String, String> {
    let mut lbls = identity_labels(desc);
    lbls.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    lbls
}

fn metadata(
    name: String,
    desc: &WorkloadDescriptor,
    ctx: &RenderContext<'_>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(ctx.namespace.to_string()),
        labels: Some(resource_labels(desc)),
        owner_references: ctx.owner_ref.clone().map(|r| vec![r]),
        ..Default::default()
    }
}

pub fn env_vars(entries: &[EnvEntry]) -> Vec<EnvVar> {
    entries
        .iter()
        .map(|e| match &e.source {
            EnvSource::Value(v) => EnvVar {
                name: e.name.clone(),
                value: Some(v.clone()),
                ..Default::default()
            },
            EnvSource::Field(path) => EnvVar {
                name: e.name.clone(),
                value_from: Some(EnvVarSource {
                    field_ref: Some(ObjectFieldSelector {
                        // the API server defaults this; set it to avoid diffs
                        api_version: Some("v1".to_string()),
                        field_path: path.to_string(),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        })
        .collect()
}

pub fn capabilities(desc: &WorkloadDescriptor) -> Option<Vec<String>> {
    if desc.capabilities.is_empty() {
        None
    } else {
        Some(desc.capabilities.clone())
    }
}

/// The container this operator owns inside the workload's pod template.
pub fn container(desc: &WorkloadDescriptor) -> Container {
    let mut c = Container {
        name: desc.container_name().to_string(),
        image: Some(desc.image.clone()),
        resources: Some(desc.resources.clone().unwrap_or_default()),
        env: Some(env_vars(&desc.env)),
        security_context: capabilities(desc).map(|add| SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(add),
                drop: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    };
    if desc.is_database() {
        let ep = desc.endpoint();
        c.ports = Some(vec![ContainerPort {
            name: Some(ep.name.to_string()),
            container_port: ep.port,
            protocol: Some(ep.protocol.to_string()),
            ..Default::default()
        }]);
        c.volume_mounts = Some(vec![VolumeMount {
            name: DATABASE_VOLUME.to_string(),
            mount_path: DATABASE_MOUNT_PATH.to_string(),
            ..Default::default()
        }]);
    }
    c
}

/// Data volume for the database pod: the claim when storage is requested,
/// scratch space otherwise.
pub fn database_volume(desc: &WorkloadDescriptor) -> Volume {
    match desc.claim() {
        Some(_) => Volume {
            name: DATABASE_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: desc.name(),
                read_only: None,
            }),
            ..Default::default()
        },
        None => Volume {
            name: DATABASE_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    }
}

pub fn render_deployment(
    desc: &WorkloadDescriptor,
    ctx: &RenderContext<'_>,
) -> Deployment {
    let labels = identity_labels(desc);
    let mut annotations = None;
    set_networks_annotation(&mut annotations, desc.network_annotation.as_deref());

    Deployment {
        metadata: metadata(desc.name(), desc, ctx),
        spec: Some(DeploymentSpec {
            replicas: Some(desc.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container(desc)],
                    volumes: desc
                        .is_database()
                        .then(|| vec![database_volume(desc)]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn service_ports(desc: &WorkloadDescriptor) -> Vec<ServicePort> {
    let ep = desc.endpoint();
    vec![ServicePort {
        name: Some(ep.name.to_string()),
        protocol: Some(ep.protocol.to_string()),
        port: ep.port,
        target_port: Some(IntOrString::Int(ep.port)),
        ..Default::default()
    }]
}

pub fn render_service(
    desc: &WorkloadDescriptor,
    ctx: &RenderContext<'_>,
) -> Service {
    Service {
        metadata: metadata(desc.name(), desc, ctx),
        spec: Some(ServiceSpec {
            selector: Some(identity_labels(desc)),
            ports: Some(service_ports(desc)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn render_claim(
    desc: &WorkloadDescriptor,
    claim: &ClaimRequest,
    ctx: &RenderContext<'_>,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: metadata(desc.name(), desc, ctx),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    claim.size.clone(),
                )])),
                ..Default::default()
            }),
            storage_class_name: claim.storage_class.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Render every child resource for a descriptor, claim first so the pod
/// never references a missing volume.
pub fn render(
    desc: &WorkloadDescriptor,
    ctx: &RenderContext<'_>,
) -> Vec<RenderedResource> {
    let mut out = Vec::with_capacity(3);
    if let Some(claim) = desc.claim() {
        out.push(RenderedResource::Claim(render_claim(desc, claim, ctx)));
    }
    out.push(RenderedResource::Deployment(render_deployment(desc, ctx)));
    out.push(RenderedResource::Service(render_service(desc, ctx)));
    out
}
