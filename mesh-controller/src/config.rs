use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand, Debug)]
pub enum Commands {
    /// Run the Service controller
    Controller(ControllerArgs),
    /// Print the custom resource definitions as YAML
    Crdgen,
}

#[derive(Parser, Debug, Clone)]
pub struct ControllerArgs {
    /// Metrics and readiness listener
    #[arg(long, env = "METRICS_ADDRESS", default_value = "0.0.0.0:9090")]
    pub metrics_address: SocketAddr,

    /// Number of concurrent reconcile workers
    #[arg(long, env = "WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Do not create an AutoscalePolicy for Services that declare no autoscaling
    #[arg(long, env = "DISABLE_DEFAULT_AUTOSCALE_POLICY")]
    pub disable_default_autoscale_policy: bool,

    /// Seconds to wait for each cache to finish its initial list
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub store_timeout_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_defaults() {
        let cli = Cli::try_parse_from(["mesh-controller", "controller"]).expect("parse");
        let Commands::Controller(args) = cli.command else {
            panic!("expected controller command");
        };
        assert_eq!(args.metrics_address, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(args.workers, 4);
        assert!(!args.disable_default_autoscale_policy);
        assert_eq!(args.store_timeout_secs, 30);
    }

    #[test]
    fn test_controller_flags() {
        let cli = Cli::try_parse_from([
            "mesh-controller",
            "controller",
            "--workers",
            "8",
            "--disable-default-autoscale-policy",
            "--store-timeout-secs",
            "5",
        ])
        .expect("parse");
        let Commands::Controller(args) = cli.command else {
            panic!("expected controller command");
        };
        assert_eq!(args.workers, 8);
        assert!(args.disable_default_autoscale_policy);
        assert_eq!(args.store_timeout_secs, 5);
    }
}
