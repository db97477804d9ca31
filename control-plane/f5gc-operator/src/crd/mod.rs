pub mod free5gc;

pub use free5gc::{Free5GC, Free5GCSpec, Free5GCStatus};

pub const API_GROUP: &str = "core.free5gc.org";

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::CustomResourceExt;

    #[test]
    fn crd_is_namespaced_with_status_subresource() {
        let crd = Free5GC::crd();
        assert_eq!(crd.spec.group, API_GROUP);
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "Free5GC");
        assert_eq!(crd.spec.names.short_names, Some(vec!["f5gc".to_string()]));
        let version = &crd.spec.versions[0];
        assert_eq!(version.name, "v1alpha1");
        assert!(
            version
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some()
        );
    }
}
