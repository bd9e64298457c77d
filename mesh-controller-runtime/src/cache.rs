use std::sync::Arc;

use kube::Resource;
use kube::runtime::reflector::{ObjectRef, Store};

/// Read side of an eventually-consistent local view of remote state.
///
/// Implementations must be safe for concurrent reads from every worker.
/// Workers never write to the cache; their writes go to the remote API and
/// arrive back here through the watch stream.
pub trait ResourceCache<K>: Send + Sync {
    fn get_by_namespace_name(&self, namespace: &str, name: &str) -> Option<Arc<K>>;
}

impl<K> ResourceCache<K> for Store<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get_by_namespace_name(&self, namespace: &str, name: &str) -> Option<Arc<K>> {
        self.get(&ObjectRef::new(name).within(namespace))
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use kube::runtime::{reflector::store, watcher};

    use super::*;

    #[test]
    fn test_store_lookup_by_namespace_name() {
        let (cache, mut writer) = store::<ConfigMap>();
        writer.apply_watcher_event(&watcher::Event::Apply(ConfigMap {
            metadata: ObjectMeta {
                name: Some("foo".into()),
                namespace: Some("ns-a".into()),
                ..Default::default()
            },
            ..Default::default()
        }));

        assert!(cache.get_by_namespace_name("ns-a", "foo").is_some());
        assert!(cache.get_by_namespace_name("ns-b", "foo").is_none());
        assert!(cache.get_by_namespace_name("ns-a", "bar").is_none());
    }
}
