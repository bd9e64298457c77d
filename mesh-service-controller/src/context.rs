use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service as K8sService};
use kube::runtime::reflector::Store;
use mesh_controller_crds::v1alpha1::{autoscalepolicy::AutoscalePolicy, service::Service};

pub struct Context<W> {
    pub writer: W,
    pub services: Store<Service>,
    pub deployments: Store<Deployment>,
    pub k8s_services: Store<K8sService>,
    pub autoscale_policies: Store<AutoscalePolicy>,
    pub default_autoscale_policy: bool,
}
