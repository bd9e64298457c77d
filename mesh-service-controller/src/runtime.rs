use std::{fmt::Debug, sync::Arc};

use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service as K8sService};
use kube::{Api, Client, Resource, ResourceExt};
use mesh_controller_crds::v1alpha1::{autoscalepolicy::AutoscalePolicy, service::Service};
use mesh_controller_k8s_utils::{ObjectEvent, create_store_and_events};
use mesh_controller_runtime::{Handler, Key, Reconciler, WorkQueue, metrics::ControllerMetrics};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    CONTROLLER_NAME, Result, config::ControllerConfig, context::Context,
    controller::ServiceHandler, writer::KubeWriter,
};

/// Runs the Service controller until `cancel` fires. `ready` is cancelled
/// once every cache has completed its initial list.
pub async fn start_service_controller(
    client: Client,
    config: ControllerConfig,
    ready: CancellationToken,
    cancel: CancellationToken,
) -> Result<()> {
    let timeout = Some(config.store_timeout);
    let (
        (services, service_events),
        (deployments, deployment_events),
        (k8s_services, k8s_service_events),
        (autoscale_policies, policy_events),
    ) = tokio::try_join!(
        create_store_and_events(Api::<Service>::all(client.clone()), timeout),
        create_store_and_events(Api::<Deployment>::all(client.clone()), timeout),
        create_store_and_events(Api::<K8sService>::all(client.clone()), timeout),
        create_store_and_events(Api::<AutoscalePolicy>::all(client.clone()), timeout),
    )?;
    info!("caches synced");

    let context = Arc::new(Context {
        writer: KubeWriter::new(client),
        services: services.clone(),
        deployments,
        k8s_services,
        autoscale_policies,
        default_autoscale_policy: config.default_autoscale_policy,
    });
    let handler = Arc::new(ServiceHandler::new(context));
    let reconciler = Arc::new(Reconciler::new(
        handler,
        Arc::new(services),
        Arc::new(WorkQueue::new(config.backoff)),
        config.workers,
        ControllerMetrics::new(CONTROLLER_NAME),
    ));

    // the initial list arrives on these channels as applied objects
    tokio::spawn(watch_services(reconciler.clone(), service_events));
    tokio::spawn(watch_owned(reconciler.clone(), deployment_events));
    tokio::spawn(watch_owned(reconciler.clone(), k8s_service_events));
    tokio::spawn(watch_owned(reconciler.clone(), policy_events));

    ready.cancel();
    info!("starting Service controller");
    reconciler.run(cancel).await;
    Ok(())
}

async fn watch_services<H: Handler>(
    reconciler: Arc<Reconciler<H>>,
    mut events: UnboundedReceiver<ObjectEvent<Service>>,
) {
    while let Some(event) = events.recv().await {
        reconciler.enqueue(event.object());
    }
    debug!("Service events closed");
}

/// Enqueues the owning Service whenever a child is added, changed or
/// deleted, so a deleted child is recreated on the next pass.
async fn watch_owned<H, K>(
    reconciler: Arc<Reconciler<H>>,
    mut events: UnboundedReceiver<ObjectEvent<K>>,
) where
    H: Handler,
    K: Resource<DynamicType = ()> + Debug + Send + 'static,
{
    while let Some(event) = events.recv().await {
        if let ObjectEvent::Deleted(child) = &event {
            debug!(kind = %K::kind(&()), name = child.name_any(), "child deleted");
        }
        if let Some(key) = owner_service_key(event.object()) {
            reconciler.enqueue_key(&key);
        }
    }
    debug!(kind = %K::kind(&()), "events closed");
}

/// Maps a child back to the Service that controls it.
fn owner_service_key<K: Resource>(child: &K) -> Option<Key> {
    let namespace = child.namespace()?;
    child
        .owner_references()
        .iter()
        .find(|o| {
            o.controller == Some(true)
                && o.kind == Service::kind(&())
                && o.api_version == Service::api_version(&())
        })
        .map(|o| Key::new(namespace, o.name.clone()))
}
