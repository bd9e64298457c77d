use std::collections::BTreeMap;

use kube::{CustomResource, KubeSchema, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::NO_OWNER_CELL;
use crate::v1alpha1::autoscalepolicy::ResourceMetric;

const DEFAULT_SERVICE_PORT: i32 = 80;

#[derive(
    CustomResource, KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug,
)]
#[kube(
    group = "mesh-controller.dev",
    version = "v1alpha1",
    kind = "Service",
    status = "ServiceStatus",
    shortname = "msvc",
    derive = "Default",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Host","type":"string","jsonPath":".status.hostName"}"#,
    printcolumn = r#"{"name":"Cell","type":"string","jsonPath":".status.ownerCell"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Replica count for the workload when no autoscaler overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    pub container: ContainerTemplate,
    /// Port exposed by the network endpoint
    #[serde(default = "default_service_port")]
    pub service_port: i32,
    /// Absent means no explicit autoscaling intent was declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscalingIntent>,
}

fn default_service_port() -> i32 {
    DEFAULT_SERVICE_PORT
}

#[derive(KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTemplate {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
}

#[derive(KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub container_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(KubeSchema, Serialize, Deserialize, Default, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalingIntent {
    pub min_replicas: i32,
    pub max_replicas: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ResourceMetric>,
}

/// Written only by the controller; user edits are overwritten on the next reconcile.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_cell: String,
}

impl ServiceStatus {
    pub fn has_owner_cell(&self) -> bool {
        !self.owner_cell.is_empty()
    }
}

impl Service {
    /// Name of the resource controlling this Service, if one is recorded.
    pub fn controller_name(&self) -> Option<String> {
        self.owner_references()
            .iter()
            .find(|o| o.controller == Some(true))
            .map(|o| o.name.clone())
    }

    /// `ownerCell` value this Service should converge to.
    pub fn resolve_owner_cell(&self) -> String {
        self.controller_name()
            .unwrap_or_else(|| NO_OWNER_CELL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
    use kube::api::ObjectMeta;

    use super::*;

    fn make_service(owners: Vec<OwnerReference>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("foo".into()),
                namespace: Some("ns".into()),
                owner_references: Some(owners),
                ..Default::default()
            },
            spec: ServiceSpec::default(),
            status: None,
        }
    }

    fn owner(name: &str, controller: Option<bool>) -> OwnerReference {
        OwnerReference {
            api_version: "mesh-controller.dev/v1alpha1".into(),
            kind: "Cell".into(),
            name: name.into(),
            uid: "uid".into(),
            controller,
            block_owner_deletion: None,
        }
    }

    #[test]
    fn test_resolve_owner_cell_uses_controller_reference() {
        let service = make_service(vec![owner("other", None), owner("cell-a", Some(true))]);
        assert_eq!(service.resolve_owner_cell(), "cell-a");
    }

    #[test]
    fn test_resolve_owner_cell_without_controller() {
        let service = make_service(vec![owner("other", Some(false))]);
        assert_eq!(service.resolve_owner_cell(), NO_OWNER_CELL);
    }

    #[test]
    fn test_service_port_defaults() {
        let spec: ServiceSpec =
            serde_json::from_str(r#"{"container":{"image":"nginx"}}"#).expect("spec");
        assert_eq!(spec.service_port, DEFAULT_SERVICE_PORT);
        assert!(spec.autoscaling.is_none());
    }
}
