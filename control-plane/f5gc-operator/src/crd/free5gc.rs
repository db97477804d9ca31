use k8s_openapi::api::core::v1::ResourceRequirements;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default,
)]
#[kube(
    group = "core.free5gc.org",
    version = "v1alpha1",
    kind = "Free5GC",
    plural = "free5gcs",
    shortname = "f5gc",
    namespaced,
    status = "Free5GCStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct Free5GCSpec {
    /// Backing MongoDB; omitted means no database is managed.
    #[serde(default, rename = "mongodb", skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSpec>,
    /// Network Repository Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrf: Option<ComponentSpec>,
    /// Access and Mobility Management Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amf: Option<ComponentSpec>,
    /// Session Management Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smf: Option<ComponentSpec>,
    /// User Plane Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upf: Option<UpfSpec>,
    /// Authentication Server Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ausf: Option<ComponentSpec>,
    /// Network Slice Selection Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nssf: Option<NssfSpec>,
    /// Policy Control Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcf: Option<ComponentSpec>,
    /// Unified Data Management
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udm: Option<ComponentSpec>,
    /// Unified Data Repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udr: Option<ComponentSpec>,
    /// Non-3GPP InterWorking Function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n3iwf: Option<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webui: Option<ComponentSpec>,
    /// Secondary network attachments per 3GPP reference point
    #[serde(default)]
    pub network: NetworkSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Container image for the network function
    pub image: String,
    /// Defaults to 1 when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Opaque component configuration, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Use an externally managed MongoDB instead of deploying one
    #[serde(default)]
    pub external: bool,
    /// Connection URI when `external` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Persistent storage; an emptyDir is used when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested size as a Kubernetes quantity (e.g. "10Gi")
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// N2 (NGAP, control)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n2_network: Option<NetworkAttachment>,
    /// N3 (GTP-U, user plane)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n3_network: Option<NetworkAttachment>,
    /// N4 (PFCP, signaling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n4_network: Option<NetworkAttachment>,
    /// N6 (data network / internet)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n6_network: Option<NetworkAttachment>,
    /// N9 (UPF to UPF)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n9_network: Option<NetworkAttachment>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAttachment {
    /// NetworkAttachmentDefinition name
    pub name: String,
    /// Interface name inside the pod
    pub interface: String,
    /// ipvlan | macvlan
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// ipvlan mode (l2, l3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, rename = "excludeIP", skip_serializing_if = "Option::is_none")]
    pub exclude_ip: Option<String>,
    #[serde(default, rename = "staticIP", skip_serializing_if = "Option::is_none")]
    pub static_ip: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpfSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Uplink classifier: fan the UPF out into named instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ulcl: Option<UlclSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<UpfConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UlclSpec {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<UpfInstance>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpfInstance {
    /// Instance name; unique within the ULCL block
    pub name: String,
    #[serde(flatten)]
    pub component: ComponentSpec,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpfConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pfcp: Option<PfcpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtpu: Option<GtpuConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PfcpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(default, rename = "nodeID", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrans_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retrans: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GtpuConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<String>,
    #[serde(default, rename = "ifname", skip_serializing_if = "Option::is_none")]
    pub if_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NssfSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<NssfConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NssfConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbi: Option<SbiConfig>,
    #[serde(default, rename = "nrfUri", skip_serializing_if = "Option::is_none")]
    pub nrf_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_name_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nsi_list: Vec<NsiConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SbiConfig {
    /// http | https
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, rename = "registerIPv4", skip_serializing_if = "Option::is_none")]
    pub register_ipv4: Option<String>,
    #[serde(default, rename = "bindingIPv4", skip_serializing_if = "Option::is_none")]
    pub binding_ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NsiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snssai: Option<SnssaiConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nsi_information_list: Vec<NsiInformation>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct SnssaiConfig {
    /// Slice/Service Type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sst: Option<i32>,
    /// Slice Differentiator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
pub struct NsiInformation {
    #[serde(default, rename = "nrfId", skip_serializing_if = "Option::is_none")]
    pub nrf_id: Option<String>,
    #[serde(default, rename = "nsiId", skip_serializing_if = "Option::is_none")]
    pub nsi_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Free5GCStatus {
    /// K8s-style conditions (Ready/Progressing)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// MongoDB workload status; absent when external or not deployed
    #[serde(default, rename = "mongodb", skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentStatus>,
    /// Per network function status keyed by component name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    pub phase: ComponentPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(default)]
    pub replicas: i32,
}

#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq,
)]
pub enum ComponentPhase {
    Running,
    Pending,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "lastTransitionTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_transition_time: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Ready,
    Progressing,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_accepts_camel_case_wire_names() {
        let spec: Free5GCSpec = serde_json::from_value(json!({
            "mongodb": {"external": false, "image": "mongo:6", "storage": {"size": "8Gi", "storageClassName": "fast"}},
            "amf": {"image": "free5gc/amf:v3", "replicas": 2},
            "upf": {
                "image": "free5gc/upf:v3",
                "ulcl": {"enabled": true, "instances": [{"name": "edge1", "image": "free5gc/upf:edge"}]}
            },
            "network": {"n3Network": {"name": "n3net", "interface": "n3", "staticIP": "10.0.0.5"}}
        }))
        .unwrap();

        let db = spec.database.unwrap();
        assert_eq!(db.storage.unwrap().storage_class_name.as_deref(), Some("fast"));
        assert_eq!(spec.amf.unwrap().replicas, Some(2));
        let ulcl = spec.upf.unwrap().ulcl.unwrap();
        assert_eq!(ulcl.instances[0].name, "edge1");
        assert_eq!(ulcl.instances[0].component.image, "free5gc/upf:edge");
        let n3 = spec.network.n3_network.unwrap();
        assert_eq!(n3.static_ip.as_deref(), Some("10.0.0.5"));
        assert!(spec.nrf.is_none());
    }

    #[test]
    fn status_serializes_phase_and_database_key() {
        let status = Free5GCStatus {
            database: Some(ComponentStatus {
                phase: ComponentPhase::Pending,
                message: Some("Waiting for 0/1 replicas to be ready".into()),
                ready_replicas: 0,
                replicas: 1,
            }),
            ..Default::default()
        };
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["mongodb"]["phase"], "Pending");
        assert_eq!(v["mongodb"]["readyReplicas"], 0);
        assert!(v.get("components").is_none());
    }
}
