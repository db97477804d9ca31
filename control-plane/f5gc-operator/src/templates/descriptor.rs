use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// The closed set of network functions this operator knows how to deploy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Database,
    Nrf,
    Amf,
    Smf,
    Ausf,
    Nssf,
    Pcf,
    Udm,
    Udr,
    N3iwf,
    Webui,
    Upf,
}

impl Component {
    /// Core functions in convergence order. Database and UPF are sequenced
    /// separately.
    pub const CORE: [Component; 10] = [
        Component::Nrf,
        Component::Amf,
        Component::Smf,
        Component::Ausf,
        Component::Nssf,
        Component::Pcf,
        Component::Udm,
        Component::Udr,
        Component::N3iwf,
        Component::Webui,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Database => "mongodb",
            Component::Nrf => "nrf",
            Component::Amf => "amf",
            Component::Smf => "smf",
            Component::Ausf => "ausf",
            Component::Nssf => "nssf",
            Component::Pcf => "pcf",
            Component::Udm => "udm",
            Component::Udr => "udr",
            Component::N3iwf => "n3iwf",
            Component::Webui => "webui",
            Component::Upf => "upf",
        }
    }

    /// Value of the `app` label; the database is labelled as its own app.
    pub fn app_label(self) -> &'static str {
        match self {
            Component::Database => "mongodb",
            _ => "free5gc",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which flavour of workload a descriptor renders into.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkloadKind {
    Database { storage: Option<ClaimRequest> },
    Core,
    UserPlane { instance: Option<String> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClaimRequest {
    pub size: Quantity,
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvSource {
    Value(String),
    /// Downward API field path, e.g. `status.podIP`
    Field(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub source: EnvSource,
}

impl EnvEntry {
    pub fn value(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            source: EnvSource::Value(value.into()),
        }
    }

    pub fn field(name: &str, path: &'static str) -> Self {
        Self {
            name: name.to_string(),
            source: EnvSource::Field(path),
        }
    }

    pub fn pod_ip() -> Self {
        Self::field("POD_IP", "status.podIP")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndpointPort {
    pub name: &'static str,
    pub port: i32,
    pub protocol: &'static str,
}

/// Shared SBI port exposed by every core function.
pub const SBI_ENDPOINT: EndpointPort = EndpointPort {
    name: "http",
    port: 80,
    protocol: "TCP",
};

/// PFCP control channel of the UPF.
pub const PFCP_ENDPOINT: EndpointPort = EndpointPort {
    name: "pfcp",
    port: 8805,
    protocol: "UDP",
};

pub const MONGODB_ENDPOINT: EndpointPort = EndpointPort {
    name: "mongodb",
    port: 27017,
    protocol: "TCP",
};

pub const NET_ADMIN: &str = "NET_ADMIN";

/// Normalized description of one deployable unit, derived from `Free5GCSpec`
/// before anything touches the cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadDescriptor {
    pub owner: String,
    pub component: Component,
    pub kind: WorkloadKind,
    pub image: String,
    pub replicas: i32,
    pub resources: Option<ResourceRequirements>,
    pub env: Vec<EnvEntry>,
    pub capabilities: Vec<String>,
    /// Composed `k8s.v1.cni.cncf.io/networks` value; `None` means no key.
    pub network_annotation: Option<String>,
}

impl WorkloadDescriptor {
    /// Deterministic resource name; the idempotency key for apply.
    pub fn name(&self) -> String {
        match self.instance() {
            Some(instance) => {
                format!("{}-{}-{}", self.owner, self.component, instance)
            }
            None => format!("{}-{}", self.owner, self.component),
        }
    }

    pub fn instance(&self) -> Option<&str> {
        match &self.kind {
            WorkloadKind::UserPlane { instance } => instance.as_deref(),
            _ => None,
        }
    }

    pub fn endpoint(&self) -> EndpointPort {
        match self.kind {
            WorkloadKind::Database { .. } => MONGODB_ENDPOINT,
            WorkloadKind::Core => SBI_ENDPOINT,
            WorkloadKind::UserPlane { .. } => PFCP_ENDPOINT,
        }
    }

    pub fn claim(&self) -> Option<&ClaimRequest> {
        match &self.kind {
            WorkloadKind::Database { storage } => storage.as_ref(),
            _ => None,
        }
    }

    pub fn container_name(&self) -> &'static str {
        self.component.as_str()
    }

    pub fn is_database(&self) -> bool {
        matches!(self.kind, WorkloadKind::Database { .. })
    }
}
