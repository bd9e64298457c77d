use std::time::Duration;

use kube::Client;
use mesh_service_controller::{ControllerConfig, start_service_controller};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{Result, config::ControllerArgs};

impl From<&ControllerArgs> for ControllerConfig {
    fn from(args: &ControllerArgs) -> Self {
        Self {
            workers: args.workers,
            default_autoscale_policy: !args.disable_default_autoscale_policy,
            store_timeout: Duration::from_secs(args.store_timeout_secs),
            ..Default::default()
        }
    }
}

pub async fn start(
    args: ControllerArgs,
    ready: CancellationToken,
    cancel: CancellationToken,
) -> Result<()> {
    let client = Client::try_default().await?;
    let config = ControllerConfig::from(&args);
    info!(
        workers = config.workers,
        default_autoscale_policy = config.default_autoscale_policy,
        "starting controller"
    );
    start_service_controller(client, config, ready, cancel).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_args() {
        let args = ControllerArgs {
            metrics_address: "127.0.0.1:9090".parse().unwrap(),
            workers: 2,
            disable_default_autoscale_policy: true,
            store_timeout_secs: 10,
        };
        let config = ControllerConfig::from(&args);
        assert_eq!(config.workers, 2);
        assert!(!config.default_autoscale_policy);
        assert_eq!(config.store_timeout, Duration::from_secs(10));
    }
}
