use std::time::Duration;

use mesh_controller_runtime::BackoffConfig;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of concurrent reconcile workers
    pub workers: usize,
    /// Create a default AutoscalePolicy for Services that declare no autoscaling
    pub default_autoscale_policy: bool,
    /// How long to wait for each cache to finish its initial list
    pub store_timeout: Duration,
    pub backoff: BackoffConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            default_autoscale_policy: true,
            store_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}
