use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use kube::Resource;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{Key, ResourceCache, WorkQueue, metrics::ControllerMetrics};

/// Short, low-cardinality description of an error for the failure counter.
pub trait MetricLabel {
    fn metric_label(&self) -> String;
}

/// Domain-specific reconcile function driven by a [`Reconciler`].
///
/// `handle` receives only the key and is expected to resolve the freshest
/// object from its own caches.
pub trait Handler: Send + Sync + 'static {
    type Resource: Send + Sync + 'static;
    type Error: std::error::Error + MetricLabel + Send + Sync + 'static;

    fn kind(&self) -> &'static str;

    fn handle(&self, key: &Key) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Fixed pool of workers pulling `namespace/name` keys off a shared
/// [`WorkQueue`] and passing them to a [`Handler`].
pub struct Reconciler<H: Handler> {
    handler: Arc<H>,
    cache: Arc<dyn ResourceCache<H::Resource>>,
    queue: Arc<WorkQueue<String>>,
    workers: usize,
    metrics: ControllerMetrics,
}

impl<H: Handler> Reconciler<H> {
    pub fn new(
        handler: Arc<H>,
        cache: Arc<dyn ResourceCache<H::Resource>>,
        queue: Arc<WorkQueue<String>>,
        workers: usize,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            handler,
            cache,
            queue,
            workers: workers.max(1),
            metrics,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue<String>> {
        &self.queue
    }

    /// Entry point for add/update/delete notifications.
    pub fn enqueue<K: Resource>(&self, obj: &K) {
        match Key::from_resource(obj) {
            Ok(key) => self.enqueue_key(&key),
            Err(e) => warn!(kind = self.handler.kind(), %e, "ignoring notification"),
        }
    }

    pub fn enqueue_key(&self, key: &Key) {
        self.queue.add(key.to_string());
    }

    /// Runs the workers until `cancel` fires. Items already in flight are
    /// allowed to finish before this returns.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let kind = self.handler.kind();
        info!(kind, workers = self.workers, "starting reconcile workers");

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let this = self.clone();
            workers.spawn(
                async move { this.worker().await }.instrument(info_span!("worker", kind, id)),
            );
        }

        cancel.cancelled().await;
        info!(kind, "shutting down reconcile workers");
        self.queue.shut_down();
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                error!(kind, %e, "worker task failed");
            }
        }
        info!(kind, "reconcile workers stopped");
    }

    async fn worker(&self) {
        while let Some(raw) = self.queue.get().await {
            self.process(&raw).await;
            self.queue.done(&raw);
        }
        debug!("work queue shut down");
    }

    async fn process(&self, raw: &String) {
        let kind = self.handler.kind();
        let key: Key = match raw.parse() {
            Ok(key) => key,
            Err(e) => {
                error!(kind, %e, "dropping malformed key");
                self.queue.forget(raw);
                return;
            }
        };

        if self
            .cache
            .get_by_namespace_name(&key.namespace, &key.name)
            .is_none()
        {
            info!(kind, %key, "resource in work queue no longer exists");
            self.queue.forget(raw);
            return;
        }

        let _timer = self.metrics.count_and_measure(kind);
        let outcome = AssertUnwindSafe(self.handler.handle(&key))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {
                debug!(kind, %key, "reconciled");
                self.queue.forget(raw);
            }
            Ok(Err(e)) => {
                self.metrics.count_failure(kind, e.metric_label());
                self.metrics.count_requeue(kind);
                let delay = self.queue.add_rate_limited(raw.clone());
                error!(kind, %key, error = %e, ?delay, "reconcile failed, requeueing");
            }
            Err(panic) => {
                self.metrics.count_failure(kind, "panic".into());
                self.metrics.count_requeue(kind);
                let delay = self.queue.add_rate_limited(raw.clone());
                error!(
                    kind,
                    %key,
                    panic = panic_message(&panic),
                    ?delay,
                    "reconcile panicked, requeueing"
                );
            }
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
