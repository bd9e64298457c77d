use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::serde::de::DeserializeOwned;
use kube::runtime::reflector::Store;
use kube::runtime::{WatchStreamExt, reflector, watcher};
use kube::{Api, Resource};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, trace};

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to create store: {0}")]
    StoreCreation(String),

    #[error("kube error: {0}")]
    KubeError(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Change observed by a cache, after it has been applied to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEvent<K> {
    Applied(K),
    Deleted(K),
}

impl<K> ObjectEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            ObjectEvent::Applied(obj) | ObjectEvent::Deleted(obj) => obj,
        }
    }
}

/// Maps a raw watcher event to the change it carries. Objects from a
/// (re)list count as applied, so every relist replays the whole cache.
pub fn object_event<K>(event: watcher::Event<K>) -> Option<ObjectEvent<K>> {
    match event {
        watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
            Some(ObjectEvent::Applied(obj))
        }
        watcher::Event::Delete(obj) => Some(ObjectEvent::Deleted(obj)),
        watcher::Event::Init | watcher::Event::InitDone => None,
    }
}

/// Starts a list-then-watch reflector for `api` and returns its store along
/// with a channel carrying every add, update and delete it observes.
///
/// The channel is unbounded so the initial list never waits on a consumer
/// that is itself waiting for the store to become ready.
pub async fn create_store_and_events<K>(
    api: Api<K>,
    timeout: Option<Duration>,
) -> Result<(Store<K>, mpsc::UnboundedReceiver<ObjectEvent<K>>)>
where
    K: Resource + Send + Clone + Debug + DeserializeOwned + Sync + 'static,
    <K as Resource>::DynamicType: Default + Eq + Send + Sync + Hash + Clone,
{
    let (store, writer) = reflector::store();
    let (tx, rx) = mpsc::unbounded_channel();

    let stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .reflect(writer)
        .for_each(move |res| {
            match res {
                Ok(ev) => {
                    if let Some(ev) = object_event(ev)
                        && tx.send(ev).is_err()
                    {
                        trace!("event receiver dropped");
                    }
                }
                Err(e) => error!(%e, "unexpected error with stream"),
            }
            futures::future::ready(())
        });

    tokio::spawn(stream);
    let wait = store.wait_until_ready();
    let ready = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::StoreCreation("timed out waiting for store".into()))?,
        None => wait.await,
    };
    ready.map_err(|e| Error::StoreCreation(e.to_string()))?;
    Ok((store, rx))
}

pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// Create rejected because an object with the same name exists.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists")
}

pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409 && resp.reason != "AlreadyExists")
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::{api::ObjectMeta, core::ErrorResponse};

    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("{reason} for test"),
            reason: reason.into(),
            code,
        })
    }

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("ns".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(is_not_found(&api_error(404, "NotFound")));
        assert!(!is_not_found(&api_error(409, "AlreadyExists")));
        assert!(is_already_exists(&api_error(409, "AlreadyExists")));
        assert!(!is_already_exists(&api_error(409, "Conflict")));
        assert!(is_conflict(&api_error(409, "Conflict")));
        assert!(!is_conflict(&api_error(409, "AlreadyExists")));
        assert!(!is_conflict(&api_error(500, "InternalError")));
    }

    #[test]
    fn test_object_event_keeps_deletes() {
        let cm = config_map("foo");
        assert_eq!(
            object_event(watcher::Event::Delete(cm.clone())),
            Some(ObjectEvent::Deleted(cm.clone()))
        );
        assert_eq!(
            object_event(watcher::Event::Apply(cm.clone())),
            Some(ObjectEvent::Applied(cm.clone()))
        );
        assert_eq!(
            object_event(watcher::Event::InitApply(cm.clone())),
            Some(ObjectEvent::Applied(cm))
        );
        assert_eq!(object_event::<ConfigMap>(watcher::Event::Init), None);
        assert_eq!(object_event::<ConfigMap>(watcher::Event::InitDone), None);
    }
}
