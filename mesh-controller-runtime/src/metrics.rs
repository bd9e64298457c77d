use std::{
    borrow::Cow,
    sync::{LazyLock, RwLock},
};

use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time::Instant;

pub static REGISTRY: LazyLock<RwLock<Registry>> =
    LazyLock::new(|| RwLock::new(Registry::with_prefix("mesh_controller")));

/// Renders every registered metric in the OpenMetrics text format.
pub fn encode() -> String {
    let mut buffer = String::new();
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    match prometheus_client::encoding::text::encode(&mut buffer, &registry) {
        Ok(_) => buffer,
        Err(_) => String::new(),
    }
}

#[derive(Clone)]
pub struct ControllerMetrics {
    pub runs: Family<ControllerLabels, Counter>,
    pub failures: Family<ErrorLabels, Counter>,
    pub requeues: Family<ControllerLabels, Counter>,
    pub duration: Histogram,
}

impl ControllerMetrics {
    /// Register controller metrics to start tracking them.
    pub fn new(controller_name: &str) -> Self {
        let mut guard = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
        let registry = guard.sub_registry_with_label((
            Cow::Borrowed("controller_name"),
            Cow::Owned(controller_name.into()),
        ));
        let runs = Family::<ControllerLabels, Counter>::default();
        let failures = Family::<ErrorLabels, Counter>::default();
        let requeues = Family::<ControllerLabels, Counter>::default();
        let duration = Histogram::new([0.01, 0.1, 0.25, 0.5, 1.0, 5.0, 15.0, 60.0].into_iter());

        registry.register_with_unit(
            "reconcile_duration",
            "reconcile duration",
            Unit::Seconds,
            duration.clone(),
        );
        registry.register(
            "reconcile_failures",
            "Number of reconciliation errors",
            failures.clone(),
        );
        registry.register(
            "reconcile_requeues",
            "Number of rate limited requeues",
            requeues.clone(),
        );
        registry.register("reconcile_runs", "Number of reconciliations", runs.clone());
        Self {
            runs,
            failures,
            requeues,
            duration,
        }
    }

    pub fn count_failure(&self, kind: &str, error: String) {
        self.failures
            .get_or_create(&ErrorLabels {
                resource: kind.to_lowercase(),
                error,
            })
            .inc();
    }

    pub fn count_requeue(&self, kind: &str) {
        self.requeues
            .get_or_create(&ControllerLabels {
                resource: kind.to_lowercase(),
            })
            .inc();
    }

    pub fn count_and_measure(&self, kind: &str) -> ReconcileMeasurer {
        self.runs
            .get_or_create(&ControllerLabels {
                resource: kind.to_lowercase(),
            })
            .inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.duration.clone(),
        }
    }
}

pub struct ReconcileMeasurer {
    start: Instant,
    metric: Histogram,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ControllerLabels {
    pub resource: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub resource: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_labelled_by_resource() {
        let metrics = ControllerMetrics::new("metrics-test");
        metrics.count_and_measure("Service");
        metrics.count_failure("Service", "kube".into());
        metrics.count_requeue("Service");

        let labels = ControllerLabels {
            resource: "service".into(),
        };
        assert_eq!(metrics.runs.get_or_create(&labels).get(), 1);
        assert_eq!(metrics.requeues.get_or_create(&labels).get(), 1);
        let error = ErrorLabels {
            resource: "service".into(),
            error: "kube".into(),
        };
        assert_eq!(metrics.failures.get_or_create(&error).get(), 1);
        assert!(encode().contains("mesh_controller_reconcile_runs"));
    }
}
