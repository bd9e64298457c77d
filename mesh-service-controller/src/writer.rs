use std::{fmt::Debug, future::Future};

use k8s_openapi::{
    NamespaceResourceScope,
    api::{apps::v1::Deployment, core::v1::Service as K8sService},
};
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
use mesh_controller_crds::v1alpha1::{autoscalepolicy::AutoscalePolicy, service::Service};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result};

const MANAGER: &str = "mesh-service-controller";

/// Remote side for one resource type. A missing object is reported as
/// [`Error::NotFound`] and a create that collides with an existing object as
/// [`Error::AlreadyExists`].
pub trait ResourceWriter<K>: Send + Sync {
    /// Reads the object straight from the API server, bypassing the cache.
    fn get(&self, namespace: &str, name: &str) -> impl Future<Output = Result<K>> + Send;

    fn create(&self, obj: &K) -> impl Future<Output = Result<K>> + Send;

    /// Persists the status of `obj`, guarded by its `resourceVersion`.
    fn update(&self, obj: &K) -> impl Future<Output = Result<K>> + Send;
}

/// Every write the Service handler issues.
pub trait ServiceWriter:
    ResourceWriter<Service>
    + ResourceWriter<Deployment>
    + ResourceWriter<K8sService>
    + ResourceWriter<AutoscalePolicy>
    + Send
    + Sync
    + 'static
{
}

impl<W> ServiceWriter for W where
    W: ResourceWriter<Service>
        + ResourceWriter<Deployment>
        + ResourceWriter<K8sService>
        + ResourceWriter<AutoscalePolicy>
        + Send
        + Sync
        + 'static
{
}

#[derive(Clone)]
pub struct KubeWriter {
    client: Client,
}

impl KubeWriter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, obj: &K) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        let ns = obj
            .namespace()
            .ok_or_else(|| Error::MissingNamespace(obj.name_any()))?;
        Ok(Api::namespaced(self.client.clone(), &ns))
    }
}

impl<K> ResourceWriter<K> for KubeWriter
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    K: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get(name).await?)
    }

    async fn create(&self, obj: &K) -> Result<K> {
        let api = self.api(obj)?;
        let params = PostParams {
            field_manager: Some(MANAGER.into()),
            ..Default::default()
        };
        Ok(api.create(&params, obj).await?)
    }

    async fn update(&self, obj: &K) -> Result<K> {
        let api = self.api(obj)?;
        let mut obj = obj.clone();
        obj.meta_mut().managed_fields = None;
        let params = PatchParams {
            field_manager: Some(MANAGER.into()),
            ..Default::default()
        };
        Ok(api
            .patch_status(&obj.name_any(), &params, &Patch::Merge(&obj))
            .await?)
    }
}
