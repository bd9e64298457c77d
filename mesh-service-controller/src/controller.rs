use std::sync::Arc;

use kube::{Resource, ResourceExt};
use mesh_controller_crds::v1alpha1::{
    autoscalepolicy::AutoscalePolicy,
    service::{Service, ServiceStatus},
};
use mesh_controller_runtime::{Handler, Key, ResourceCache};
use tracing::{debug, error, info, instrument};

use crate::{
    Result,
    context::Context,
    resources,
    writer::{ResourceWriter, ServiceWriter},
};

/// Converges the children and status of one mesh Service.
pub struct ServiceHandler<W> {
    ctx: Arc<Context<W>>,
}

impl<W: ServiceWriter> ServiceHandler<W> {
    pub fn new(ctx: Arc<Context<W>>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<Context<W>> {
        &self.ctx
    }

    /// Creates `desired`, or reads the live object when the create collides
    /// with one the cache has not observed yet.
    async fn create_or_get<K>(&self, desired: &K, key: &Key) -> Result<K>
    where
        K: Resource<DynamicType = ()>,
        W: ResourceWriter<K>,
    {
        let kind = K::kind(&());
        match ResourceWriter::<K>::create(&self.ctx.writer, desired).await {
            Ok(created) => {
                info!("created {} {}", kind, key);
                Ok(created)
            }
            Err(e) if e.is_already_exists() => {
                debug!("{} {} already exists, reading it back", kind, key);
                ResourceWriter::<K>::get(&self.ctx.writer, &key.namespace, &key.name).await
            }
            Err(e) => {
                error!(%e, "failed to create {} {}", kind, key);
                Err(e)
            }
        }
    }

    async fn handle_deployment(&self, service: &Service, status: &mut ServiceStatus) -> Result<()> {
        let key = resources::deployment_key(service);
        let deployment = match self
            .ctx
            .deployments
            .get_by_namespace_name(&key.namespace, &key.name)
        {
            Some(deployment) => deployment,
            None => Arc::new(
                self.create_or_get(&resources::create_deployment(service), &key)
                    .await?,
            ),
        };

        status.available_replicas = deployment
            .status
            .as_ref()
            .and_then(|s| s.available_replicas)
            .unwrap_or_default();
        Ok(())
    }

    async fn handle_autoscale_policy(&self, service: &Service) -> Result<()> {
        let Some(desired) =
            resources::desired_autoscale_policy(service, self.ctx.default_autoscale_policy)
        else {
            debug!("no autoscaling declared for Service {}", service.name_any());
            return Ok(());
        };

        let key = resources::autoscale_policy_key(service);
        let mut policy = match self
            .ctx
            .autoscale_policies
            .get_by_namespace_name(&key.namespace, &key.name)
        {
            Some(cached) if cached.is_ready() => return Ok(()),
            // the cached copy may predate the status write, read the live one
            Some(_) => {
                ResourceWriter::<AutoscalePolicy>::get(&self.ctx.writer, &key.namespace, &key.name)
                    .await?
            }
            None => self.create_or_get(&desired, &key).await?,
        };
        if policy.is_ready() {
            return Ok(());
        }

        policy.mark_ready();
        ResourceWriter::<AutoscalePolicy>::update(&self.ctx.writer, &policy)
            .await
            .inspect_err(|e| error!(%e, "failed to update AutoscalePolicy {} status", key))?;
        info!("marked AutoscalePolicy {} ready", key);
        Ok(())
    }

    async fn handle_k8s_service(
        &self,
        service: &Service,
        status: &mut ServiceStatus,
    ) -> Result<()> {
        let key = resources::k8s_service_key(service);
        let k8s_service = match self
            .ctx
            .k8s_services
            .get_by_namespace_name(&key.namespace, &key.name)
        {
            Some(k8s_service) => k8s_service,
            None => Arc::new(
                self.create_or_get(&resources::create_k8s_service(service), &key)
                    .await?,
            ),
        };

        status.host_name = k8s_service.name_any();
        Ok(())
    }

    async fn update_status(&self, key: &Key, status: ServiceStatus) -> Result<()> {
        // compare against the freshest cached copy rather than the snapshot
        // the reconcile started from
        let Some(latest) = self
            .ctx
            .services
            .get_by_namespace_name(&key.namespace, &key.name)
        else {
            info!("Service {} deleted during reconcile", key);
            return Ok(());
        };

        if latest.status.clone().unwrap_or_default() == status {
            debug!("status of Service {} unchanged", key);
            return Ok(());
        }

        let mut updated = (*latest).clone();
        updated.status = Some(status);
        match ResourceWriter::<Service>::update(&self.ctx.writer, &updated).await {
            Ok(_) => {
                info!("updated status of Service {}", key);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Service {} deleted before status update", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// `ownerCell` is resolved once and then left alone.
fn update_owner_cell(service: &Service, status: &mut ServiceStatus) {
    if !status.has_owner_cell() {
        status.owner_cell = service.resolve_owner_cell();
    }
}

impl<W: ServiceWriter> Handler for ServiceHandler<W> {
    type Resource = Service;
    type Error = crate::Error;

    fn kind(&self) -> &'static str {
        "Service"
    }

    #[instrument(skip_all, fields(%key))]
    async fn handle(&self, key: &Key) -> Result<()> {
        let Some(cached) = self
            .ctx
            .services
            .get_by_namespace_name(&key.namespace, &key.name)
        else {
            info!("Service {} in work queue no longer exists", key);
            return Ok(());
        };
        info!("started reconciling Service {}", key);

        let service = cached.as_ref();
        let mut status = service.status.clone().unwrap_or_default();

        self.handle_deployment(service, &mut status).await?;
        self.handle_autoscale_policy(service).await?;
        self.handle_k8s_service(service, &mut status).await?;
        update_owner_cell(service, &mut status);

        self.update_status(key, status).await
    }
}
