use std::collections::BTreeSet;

use super::ConfigError;
use super::descriptor::{
    Component, EnvEntry, NET_ADMIN, WorkloadDescriptor, WorkloadKind,
};
use super::network::{Interface, compose_for};
use crate::crd::free5gc::{NetworkSpec, UpfInstance, UpfSpec};

/// Interfaces a standalone UPF attaches to.
pub const SINGLE_INTERFACES: [Interface; 2] =
    [Interface::UserPlane, Interface::Signaling];

/// ULCL instances additionally forward to each other over N9.
pub const ULCL_INTERFACES: [Interface; 3] = [
    Interface::UserPlane,
    Interface::Signaling,
    Interface::InterFunction,
];

/// The two mutually exclusive UPF deployment shapes.
#[derive(Debug, Clone, Copy)]
pub enum UpfTopology<'a> {
    Single,
    Ulcl(&'a [UpfInstance]),
}

impl<'a> UpfTopology<'a> {
    pub fn of(upf: &'a UpfSpec) -> Self {
        match upf.ulcl.as_ref() {
            Some(ulcl) if ulcl.enabled => UpfTopology::Ulcl(&ulcl.instances),
            _ => UpfTopology::Single,
        }
    }
}

/// Resolve the UPF spec into one descriptor, or one per ULCL instance.
pub fn resolve_upf(
    owner: &str,
    upf: &UpfSpec,
    network: &NetworkSpec,
) -> Result<Vec<WorkloadDescriptor>, ConfigError> {
    match UpfTopology::of(upf) {
        UpfTopology::Single => Ok(vec![WorkloadDescriptor {
            owner: owner.to_string(),
            component: Component::Upf,
            kind: WorkloadKind::UserPlane { instance: None },
            image: upf.image.clone(),
            replicas: upf.replicas.unwrap_or(1),
            resources: upf.resources.clone(),
            env: vec![EnvEntry::pod_ip()],
            capabilities: vec![NET_ADMIN.to_string()],
            network_annotation: compose_for(network, &SINGLE_INTERFACES),
        }]),
        UpfTopology::Ulcl(instances) => {
            validate_instances(instances)?;
            let annotation = compose_for(network, &ULCL_INTERFACES);
            Ok(instances
                .iter()
                .map(|inst| WorkloadDescriptor {
                    owner: owner.to_string(),
                    component: Component::Upf,
                    kind: WorkloadKind::UserPlane {
                        instance: Some(inst.name.clone()),
                    },
                    image: inst.component.image.clone(),
                    replicas: inst.component.replicas.unwrap_or(1),
                    resources: inst.component.resources.clone(),
                    env: vec![
                        EnvEntry::pod_ip(),
                        EnvEntry::value("UPF_NAME", inst.name.clone()),
                    ],
                    capabilities: vec![NET_ADMIN.to_string()],
                    network_annotation: annotation.clone(),
                })
                .collect())
        }
    }
}

fn validate_instances(instances: &[UpfInstance]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for (index, inst) in instances.iter().enumerate() {
        if inst.name.trim().is_empty() {
            return Err(ConfigError::EmptyUlclInstanceName { index });
        }
        if !is_dns_label(&inst.name) {
            return Err(ConfigError::InvalidUlclInstanceName {
                index,
                name: inst.name.clone(),
            });
        }
        if !seen.insert(inst.name.as_str()) {
            return Err(ConfigError::DuplicateUlclInstance {
                index,
                name: inst.name.clone(),
            });
        }
    }
    Ok(())
}

/// RFC 1123 label: lowercase alphanumerics and '-', alphanumeric at both
/// ends, at most 63 characters. Instance names end up in object names.
fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes.first().is_some_and(alnum)
        && bytes.last().is_some_and(alnum)
        && bytes.iter().all(|b| alnum(b) || *b == b'-')
}
