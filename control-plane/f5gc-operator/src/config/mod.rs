mod types;

pub use types::{FeaturesConfig, OperatorConfig, RequeueConfig};
