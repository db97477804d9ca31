//! Pure translation from a `Free5GC` spec to the child resources it implies.
//!
//! Nothing here talks to the API server: [`build_desired_state`] validates
//! and normalizes `Free5GCSpec` into [`WorkloadDescriptor`]s and [`render`] turns
//! each descriptor into concrete Kubernetes objects.

pub mod builder;
pub mod descriptor;
pub mod network;
pub mod quantity;
pub mod render;
pub mod upf;

pub use builder::{BuildDefaults, build_desired_state};
pub use descriptor::{Component, WorkloadDescriptor, WorkloadKind};
pub use render::{RenderContext, RenderedResource, owner_selector, render};

/// A spec that cannot be turned into a desired state. Each message leads
/// with the offending field path.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("spec.mongodb.storage.size: invalid quantity {value:?}: {reason}")]
    InvalidStorageSize { value: String, reason: String },
    #[error(
        "spec.upf.ulcl.instances[{index}].name: duplicate instance name {name:?}"
    )]
    DuplicateUlclInstance { index: usize, name: String },
    #[error(
        "spec.upf.ulcl.instances[{index}].name: instance name must not be empty"
    )]
    EmptyUlclInstanceName { index: usize },
    #[error(
        "spec.upf.ulcl.instances[{index}].name: {name:?} is not a lowercase RFC 1123 label"
    )]
    InvalidUlclInstanceName { index: usize, name: String },
}
