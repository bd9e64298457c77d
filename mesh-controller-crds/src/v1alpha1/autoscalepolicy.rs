use kube::{CustomResource, KubeSchema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status recorded once the policy has been created successfully.
pub const POLICY_READY: &str = "Ready";

#[derive(
    CustomResource, KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug,
)]
#[kube(
    group = "mesh-controller.dev",
    version = "v1alpha1",
    kind = "AutoscalePolicy",
    status = "AutoscalePolicyStatus",
    derive = "Default",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalePolicySpec {
    pub min_replicas: i32,
    pub max_replicas: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ResourceMetric>,
    pub scale_target_ref: ScaleTargetRef,
}

#[derive(KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetric {
    /// Resource name, e.g. `cpu` or `memory`
    pub name: String,
    pub target_average_utilization: i32,
}

#[derive(KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTargetRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub struct AutoscalePolicyStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
}

impl AutoscalePolicy {
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == POLICY_READY)
    }

    pub fn mark_ready(&mut self) {
        self.status = Some(AutoscalePolicyStatus {
            state: POLICY_READY.to_string(),
        });
    }
}
