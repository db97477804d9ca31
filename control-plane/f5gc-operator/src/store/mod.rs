//! Narrow view of the cluster API used by reconciliation.
//!
//! [`KubeStore`] talks to a real API server. With the `test-util` feature,
//! `MemoryStore` keeps objects in-process for the reconcile tests.

mod cluster;
#[cfg(any(test, feature = "test-util"))]
mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::{Serialize, de::DeserializeOwned};

pub use cluster::KubeStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryStore, merge_patch};

/// Namespaced, typed API objects the store can persist.
pub trait Managed:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Managed for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_else(|| "default".to_string()),
            name: obj.name_any(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn not_found<K: Resource<DynamicType = ()>>(
        key: &ObjectKey,
    ) -> Self {
        StoreError::NotFound {
            kind: K::kind(&()).to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    pub(crate) fn already_exists<K: Resource<DynamicType = ()>>(
        key: &ObjectKey,
    ) -> Self {
        StoreError::AlreadyExists {
            kind: K::kind(&()).to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    pub(crate) fn conflict<K: Resource<DynamicType = ()>>(
        key: &ObjectKey,
    ) -> Self {
        StoreError::Conflict {
            kind: K::kind(&()).to_string(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    /// Retryable without operator intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. }
                | StoreError::AlreadyExists { .. }
                | StoreError::Unavailable(_)
                | StoreError::Kube(_)
        )
    }
}

/// The handful of API verbs reconciliation needs, generic over the object
/// type so Deployments, Services, PVCs and the `Free5GC` object itself share
/// one seam.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn get<K: Managed>(
        &self,
        key: &ObjectKey,
    ) -> Result<Option<K>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError>;

    /// Full update; fails with [`StoreError::Conflict`] when the object's
    /// resourceVersion is stale.
    async fn replace<K: Managed>(&self, obj: &K) -> Result<K, StoreError>;

    async fn list<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<K>, StoreError>;

    /// Foreground deletion of everything matching the label selector.
    async fn delete_collection<K: Managed>(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<(), StoreError>;

    /// Foreground deletion of a single object. Deleting something already
    /// gone is not an error.
    async fn delete<K: Managed>(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// JSON merge patch against the main resource.
    async fn patch_merge<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;

    /// JSON merge patch against the status subresource.
    async fn patch_status<K: Managed>(
        &self,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;
}

/// Key of an object about to be written, failing when it has no name.
pub(crate) fn key_for<K: Resource>(obj: &K) -> Result<ObjectKey, StoreError> {
    match obj.meta().name.as_deref() {
        Some(name) if !name.is_empty() => Ok(ObjectKey::new(
            obj.namespace().unwrap_or_else(|| "default".to_string()),
            name,
        )),
        _ => Err(StoreError::Unavailable(
            "object is missing metadata.name".to_string(),
        )),
    }
}
