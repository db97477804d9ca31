use k8s_openapi::api::core::v1::ResourceRequirements;

use super::ConfigError;
use super::descriptor::{
    ClaimRequest, Component, EnvEntry, WorkloadDescriptor, WorkloadKind,
};
use super::quantity::parse_storage_quantity;
use super::upf::resolve_upf;
use crate::crd::free5gc::{ComponentSpec, Free5GCSpec, NssfSpec};

/// Fallbacks for fields a `Free5GC` object leaves empty.
#[derive(Clone, Debug)]
pub struct BuildDefaults {
    pub database_image: String,
}

impl Default for BuildDefaults {
    fn default() -> Self {
        Self {
            database_image: "mongo:6.0".to_string(),
        }
    }
}

/// Borrowed view over the common workload fields shared by the component
/// spec flavours.
struct WorkloadSource<'a> {
    image: &'a str,
    replicas: Option<i32>,
    resources: Option<&'a ResourceRequirements>,
}

impl<'a> From<&'a ComponentSpec> for WorkloadSource<'a> {
    fn from(c: &'a ComponentSpec) -> Self {
        Self {
            image: &c.image,
            replicas: c.replicas,
            resources: c.resources.as_ref(),
        }
    }
}

impl<'a> From<&'a NssfSpec> for WorkloadSource<'a> {
    fn from(c: &'a NssfSpec) -> Self {
        Self {
            image: &c.image,
            replicas: c.replicas,
            resources: c.resources.as_ref(),
        }
    }
}

fn core_source(
    spec: &Free5GCSpec,
    component: Component,
) -> Option<WorkloadSource<'_>> {
    let c = match component {
        Component::Nrf => spec.nrf.as_ref(),
        Component::Amf => spec.amf.as_ref(),
        Component::Smf => spec.smf.as_ref(),
        Component::Ausf => spec.ausf.as_ref(),
        Component::Nssf => return spec.nssf.as_ref().map(Into::into),
        Component::Pcf => spec.pcf.as_ref(),
        Component::Udm => spec.udm.as_ref(),
        Component::Udr => spec.udr.as_ref(),
        Component::N3iwf => spec.n3iwf.as_ref(),
        Component::Webui => spec.webui.as_ref(),
        Component::Database | Component::Upf => None,
    };
    c.map(Into::into)
}

/// Derive the ordered desired state for one `Free5GC` object:
/// database, core functions in registry order, then the UPF topology.
///
/// Pure and deterministic. All configuration errors surface here, before
/// anything is written to the cluster.
pub fn build_desired_state(
    owner: &str,
    spec: &Free5GCSpec,
    defaults: &BuildDefaults,
) -> Result<Vec<WorkloadDescriptor>, ConfigError> {
    let mut out = Vec::new();

    if let Some(db) = spec.database.as_ref().filter(|db| !db.external) {
        let storage = match db.storage.as_ref() {
            Some(st) => Some(ClaimRequest {
                size: parse_storage_quantity(&st.size).map_err(|reason| {
                    ConfigError::InvalidStorageSize {
                        value: st.size.clone(),
                        reason,
                    }
                })?,
                storage_class: st
                    .storage_class_name
                    .clone()
                    .filter(|s| !s.is_empty()),
            }),
            None => None,
        };
        let image = db
            .image
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| defaults.database_image.clone());
        out.push(WorkloadDescriptor {
            owner: owner.to_string(),
            component: Component::Database,
            kind: WorkloadKind::Database { storage },
            image,
            replicas: 1,
            resources: None,
            env: vec![],
            capabilities: vec![],
            network_annotation: None,
        });
    }

    for component in Component::CORE {
        let Some(src) = core_source(spec, component) else {
            continue;
        };
        out.push(WorkloadDescriptor {
            owner: owner.to_string(),
            component,
            kind: WorkloadKind::Core,
            image: src.image.to_string(),
            replicas: src.replicas.unwrap_or(1),
            resources: src.resources.cloned(),
            env: vec![EnvEntry::pod_ip()],
            capabilities: vec![],
            network_annotation: None,
        });
    }

    if let Some(upf) = spec.upf.as_ref() {
        out.extend(resolve_upf(owner, upf, &spec.network)?);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::free5gc::{DatabaseSpec, StorageSpec, UpfSpec};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use std::collections::BTreeMap;

    fn comp(image: &str) -> Option<ComponentSpec> {
        Some(ComponentSpec {
            image: image.into(),
            ..Default::default()
        })
    }

    #[test]
    fn nil_components_produce_no_descriptors() {
        let spec = Free5GCSpec::default();
        let out =
            build_desired_state("core", &spec, &BuildDefaults::default())
                .unwrap();
        assert!(out.is_empty());

        let spec = Free5GCSpec {
            amf: comp("free5gc/amf"),
            ..Default::default()
        };
        let out =
            build_desired_state("core", &spec, &BuildDefaults::default())
                .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].component, Component::Amf);
    }

    #[test]
    fn orders_database_core_then_upf() {
        let spec = Free5GCSpec {
            database: Some(DatabaseSpec::default()),
            webui: comp("free5gc/webui"),
            nrf: comp("free5gc/nrf"),
            nssf: Some(NssfSpec {
                image: "free5gc/nssf".into(),
                ..Default::default()
            }),
            upf: Some(UpfSpec {
                image: "free5gc/upf".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let names: Vec<_> =
            build_desired_state("core", &spec, &BuildDefaults::default())
                .unwrap()
                .iter()
                .map(|d| d.name())
                .collect();
        assert_eq!(
            names,
            vec![
                "core-mongodb",
                "core-nrf",
                "core-nssf",
                "core-webui",
                "core-upf"
            ]
        );
    }

    #[test]
    fn core_descriptor_defaults_and_copies_resources() {
        let resources = ResourceRequirements {
            limits: Some(BTreeMap::from([(
                "cpu".to_string(),
                Quantity("500m".into()),
            )])),
            ..Default::default()
        };
        let spec = Free5GCSpec {
            smf: Some(ComponentSpec {
                image: "free5gc/smf".into(),
                resources: Some(resources.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out =
            build_desired_state("core", &spec, &BuildDefaults::default())
                .unwrap();
        let smf = &out[0];
        assert_eq!(smf.name(), "core-smf");
        assert_eq!(smf.replicas, 1);
        assert_eq!(smf.resources, Some(resources));
        assert_eq!(smf.env, vec![EnvEntry::pod_ip()]);
        assert!(smf.capabilities.is_empty());
        assert!(smf.network_annotation.is_none());
    }

    #[test]
    fn external_database_is_not_deployed() {
        let spec = Free5GCSpec {
            database: Some(DatabaseSpec {
                external: true,
                uri: Some("mongodb://db.example:27017".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out =
            build_desired_state("core", &spec, &BuildDefaults::default())
                .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn database_storage_is_parsed_and_image_defaulted() {
        let spec = Free5GCSpec {
            database: Some(DatabaseSpec {
                storage: Some(StorageSpec {
                    size: "8Gi".into(),
                    storage_class_name: Some("fast".into()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let defaults = BuildDefaults {
            database_image: "mongo:7".into(),
        };
        let out = build_desired_state("core", &spec, &defaults).unwrap();
        assert_eq!(out[0].image, "mongo:7");
        let claim = out[0].claim().unwrap();
        assert_eq!(claim.size, Quantity("8Gi".into()));
        assert_eq!(claim.storage_class.as_deref(), Some("fast"));
    }

    #[test]
    fn malformed_storage_size_is_a_config_error() {
        let spec = Free5GCSpec {
            database: Some(DatabaseSpec {
                storage: Some(StorageSpec {
                    size: "lots".into(),
                    storage_class_name: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = build_desired_state("core", &spec, &BuildDefaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStorageSize { .. }));
        assert!(err.to_string().contains("spec.mongodb.storage.size"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let spec = Free5GCSpec {
            amf: comp("free5gc/amf"),
            upf: Some(UpfSpec {
                image: "free5gc/upf".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let d = BuildDefaults::default();
        assert_eq!(
            build_desired_state("core", &spec, &d).unwrap(),
            build_desired_state("core", &spec, &d).unwrap()
        );
    }
}
