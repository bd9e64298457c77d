use thiserror::Error;

pub mod v1alpha1;

use kube::CustomResourceExt;

/// Label stamped on every child resource with the name of the owning Service.
pub const SERVICE_NAME_LABEL: &str = "mesh-controller.dev/service";

/// Sentinel recorded in `ownerCell` when a Service has no controlling parent.
pub const NO_OWNER_CELL: &str = "<none>";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub fn crd_gen_service() -> Result<()> {
    print!(
        "---\n{}",
        serde_yaml::to_string(&v1alpha1::service::Service::crd())?
    );
    Ok(())
}

pub fn crd_gen_autoscale_policy() -> Result<()> {
    print!(
        "---\n{}",
        serde_yaml::to_string(&v1alpha1::autoscalepolicy::AutoscalePolicy::crd())?
    );
    Ok(())
}

pub fn crd_gen_all() -> Result<()> {
    crd_gen_service()?;
    crd_gen_autoscale_policy()
}
