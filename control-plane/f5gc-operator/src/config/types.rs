use std::time::Duration;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct OperatorConfig {
    #[envconfig(from = "F5GC_PROFILE", default = "dev")]
    pub profile: String,

    #[envconfig(from = "HTTP_PORT", default = "8088")]
    pub http_port: u16,

    /// Restrict the watch to one namespace; unset watches all namespaces.
    /// Env: F5GC_WATCH_NAMESPACE
    #[envconfig(from = "F5GC_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Field manager / event reporter name used for every write
    #[envconfig(from = "F5GC_FIELD_MANAGER", default = "f5gc-operator")]
    pub field_manager: String,

    /// Image used for a managed MongoDB when `spec.mongodb.image` is empty
    #[envconfig(from = "F5GC_DEFAULT_DATABASE_IMAGE", default = "mongo:6.0")]
    pub default_database_image: String,

    #[envconfig(nested)]
    pub requeue: RequeueConfig,

    #[envconfig(nested)]
    pub features: FeaturesConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct RequeueConfig {
    /// Poll interval while any component is still rolling out
    #[envconfig(from = "F5GC_PENDING_REQUEUE_SECS", default = "10")]
    pub pending_secs: u64,
    /// Poll interval while owned resources are still terminating
    #[envconfig(from = "F5GC_CLEANUP_REQUEUE_SECS", default = "5")]
    pub cleanup_secs: u64,
    #[envconfig(from = "F5GC_ERROR_REQUEUE_SECS", default = "30")]
    pub error_secs: u64,
}

impl RequeueConfig {
    pub fn pending(&self) -> Duration {
        Duration::from_secs(self.pending_secs)
    }

    pub fn cleanup(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }

    pub fn error(&self) -> Duration {
        Duration::from_secs(self.error_secs)
    }
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            pending_secs: 10,
            cleanup_secs: 5,
            error_secs: 30,
        }
    }
}

#[derive(Envconfig, Clone, Debug, Default)]
pub struct FeaturesConfig {
    /// If Some, env explicitly set; otherwise, profile defaults apply
    #[envconfig(from = "F5GC_FEATURES_EVENTS")]
    pub events: Option<bool>,
    /// Watch owned Deployments so readiness changes trigger a reconcile
    #[envconfig(from = "F5GC_FEATURES_WATCH_CHILDREN")]
    pub watch_children: Option<bool>,
}

impl FeaturesConfig {
    pub fn events(&self) -> bool {
        self.events.unwrap_or(false)
    }

    pub fn watch_children(&self) -> bool {
        self.watch_children.unwrap_or(false)
    }
}

impl OperatorConfig {
    /// Apply profile → defaults mapping, while respecting explicit env overrides.
    ///
    /// - dev: events=false, watch_children=false
    /// - full: events=true, watch_children=true
    pub fn apply_profile_defaults(mut self) -> Self {
        let (def_events, def_watch) = match self.profile.as_str() {
            "full" | "prod" | "production" => (true, true),
            _ /* dev */ => (false, false),
        };

        if self.features.events.is_none() {
            self.features.events = Some(def_events);
        }
        if self.features.watch_children.is_none() {
            self.features.watch_children = Some(def_watch);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base(profile: &str) -> OperatorConfig {
        OperatorConfig {
            profile: profile.to_string(),
            http_port: 8088,
            watch_namespace: None,
            field_manager: "f5gc-operator".into(),
            default_database_image: "mongo:6.0".into(),
            requeue: RequeueConfig::default(),
            features: FeaturesConfig::default(),
        }
    }

    #[test]
    fn profile_defaults_dev() {
        let cfg = base("dev").apply_profile_defaults();
        assert_eq!(cfg.features.events, Some(false));
        assert_eq!(cfg.features.watch_children, Some(false));
    }

    #[test]
    fn profile_defaults_full() {
        for p in ["full", "prod", "production"] {
            let cfg = base(p).apply_profile_defaults();
            assert!(cfg.features.events());
            assert!(cfg.features.watch_children());
        }
    }

    #[test]
    fn profile_defaults_respect_env_overrides() {
        let mut cfg = base("full");
        cfg.features.events = Some(false);
        let cfg = cfg.apply_profile_defaults();
        assert_eq!(cfg.features.events, Some(false));
        assert_eq!(cfg.features.watch_children, Some(true));
    }

    #[test]
    fn reads_env_with_defaults() {
        let env = HashMap::from([
            ("F5GC_PROFILE".to_string(), "full".to_string()),
            ("F5GC_WATCH_NAMESPACE".to_string(), "5gc".to_string()),
            ("F5GC_PENDING_REQUEUE_SECS".to_string(), "3".to_string()),
        ]);
        let cfg = OperatorConfig::init_from_hashmap(&env)
            .unwrap()
            .apply_profile_defaults();
        assert_eq!(cfg.watch_namespace.as_deref(), Some("5gc"));
        assert_eq!(cfg.requeue.pending(), Duration::from_secs(3));
        assert_eq!(cfg.requeue.cleanup(), Duration::from_secs(5));
        assert_eq!(cfg.field_manager, "f5gc-operator");
        assert_eq!(cfg.default_database_image, "mongo:6.0");
        assert!(cfg.features.events());
    }
}
