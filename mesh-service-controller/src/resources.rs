//! Desired state of the children owned by a mesh [`Service`].
//!
//! Everything here is pure: the same Service always yields the same names and
//! the same child objects.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, ContainerPort as K8sContainerPort, EnvVar, PodSpec, PodTemplateSpec,
            Service as K8sService, ServicePort, ServiceSpec as K8sServiceSpec,
        },
    },
    apimachinery::pkg::{
        apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference},
        util::intstr::IntOrString,
    },
};
use kube::{Resource, ResourceExt};
use mesh_controller_crds::{
    SERVICE_NAME_LABEL,
    v1alpha1::{
        autoscalepolicy::{AutoscalePolicy, AutoscalePolicySpec, ResourceMetric, ScaleTargetRef},
        service::{AutoscalingIntent, Service},
    },
};
use mesh_controller_runtime::Key;

const DEFAULT_CPU_UTILIZATION: i32 = 80;
const SERVICE_PORT_NAME: &str = "http";

pub fn deployment_name(service: &Service) -> String {
    format!("{}-deployment", service.name_any())
}

pub fn k8s_service_name(service: &Service) -> String {
    format!("{}-service", service.name_any())
}

pub fn autoscale_policy_name(service: &Service) -> String {
    format!("{}-autoscalepolicy", service.name_any())
}

pub fn deployment_key(service: &Service) -> Key {
    Key::new(service.namespace().unwrap_or_default(), deployment_name(service))
}

pub fn k8s_service_key(service: &Service) -> Key {
    Key::new(service.namespace().unwrap_or_default(), k8s_service_name(service))
}

pub fn autoscale_policy_key(service: &Service) -> Key {
    Key::new(
        service.namespace().unwrap_or_default(),
        autoscale_policy_name(service),
    )
}

pub fn service_labels(service: &Service) -> BTreeMap<String, String> {
    BTreeMap::from([(SERVICE_NAME_LABEL.to_string(), service.name_any())])
}

fn owner_references(service: &Service) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: Service::api_version(&()).into_owned(),
        block_owner_deletion: Some(true),
        controller: Some(true),
        kind: Service::kind(&()).into_owned(),
        name: service.name_any(),
        uid: service.uid().unwrap_or_default(),
    }]
}

fn child_metadata(service: &Service, name: String) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: service.namespace(),
        labels: Some(service_labels(service)),
        owner_references: Some(owner_references(service)),
        ..Default::default()
    }
}

fn container(service: &Service) -> Container {
    let template = &service.spec.container;
    let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
    let env: Vec<EnvVar> = template
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();
    let ports: Vec<K8sContainerPort> = template
        .ports
        .iter()
        .map(|p| K8sContainerPort {
            name: p.name.clone(),
            container_port: p.container_port,
            protocol: p.protocol.clone(),
            ..Default::default()
        })
        .collect();

    Container {
        name: service.name_any(),
        image: Some(template.image.clone()),
        command: non_empty(&template.command),
        args: non_empty(&template.args),
        env: (!env.is_empty()).then_some(env),
        ports: (!ports.is_empty()).then_some(ports),
        ..Default::default()
    }
}

pub fn create_deployment(service: &Service) -> Deployment {
    let labels = service_labels(service);
    Deployment {
        metadata: child_metadata(service, deployment_name(service)),
        spec: Some(DeploymentSpec {
            replicas: service.spec.replicas,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container(service)],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

pub fn create_k8s_service(service: &Service) -> K8sService {
    // route to the first declared container port, or straight through
    let target_port = service
        .spec
        .container
        .ports
        .first()
        .map_or(service.spec.service_port, |p| p.container_port);
    K8sService {
        metadata: child_metadata(service, k8s_service_name(service)),
        spec: Some(K8sServiceSpec {
            selector: Some(service_labels(service)),
            ports: Some(vec![ServicePort {
                name: Some(SERVICE_PORT_NAME.into()),
                port: service.spec.service_port,
                target_port: Some(IntOrString::Int(target_port)),
                protocol: Some("TCP".into()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    }
}

fn scale_target_ref(service: &Service) -> ScaleTargetRef {
    ScaleTargetRef {
        api_version: Deployment::api_version(&()).into_owned(),
        kind: Deployment::kind(&()).into_owned(),
        name: deployment_name(service),
    }
}

fn autoscale_policy(service: &Service, spec: AutoscalePolicySpec) -> AutoscalePolicy {
    let mut policy = AutoscalePolicy::new(&autoscale_policy_name(service), spec);
    policy.metadata = child_metadata(service, autoscale_policy_name(service));
    policy
}

/// Policy built from the autoscaling intent declared on the Service.
pub fn create_autoscale_policy(service: &Service, intent: &AutoscalingIntent) -> AutoscalePolicy {
    autoscale_policy(
        service,
        AutoscalePolicySpec {
            min_replicas: intent.min_replicas,
            max_replicas: intent.max_replicas,
            metrics: intent.metrics.clone(),
            scale_target_ref: scale_target_ref(service),
        },
    )
}

/// Minimal policy that pins the workload at its declared replica count.
pub fn create_default_autoscale_policy(service: &Service) -> AutoscalePolicy {
    let replicas = service.spec.replicas.unwrap_or(1).max(1);
    autoscale_policy(
        service,
        AutoscalePolicySpec {
            min_replicas: replicas,
            max_replicas: replicas,
            metrics: vec![ResourceMetric {
                name: "cpu".into(),
                target_average_utilization: DEFAULT_CPU_UTILIZATION,
            }],
            scale_target_ref: scale_target_ref(service),
        },
    )
}

/// The policy a Service should own, if any.
pub fn desired_autoscale_policy(
    service: &Service,
    default_policy: bool,
) -> Option<AutoscalePolicy> {
    match &service.spec.autoscaling {
        Some(intent) => Some(create_autoscale_policy(service, intent)),
        None if default_policy => Some(create_default_autoscale_policy(service)),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use mesh_controller_crds::v1alpha1::service::{ContainerPort, ContainerTemplate, ServiceSpec};

    use super::*;

    fn make_service(name: &str, autoscaling: Option<AutoscalingIntent>) -> Service {
        let mut service = Service::new(
            name,
            ServiceSpec {
                replicas: Some(2),
                container: ContainerTemplate {
                    image: "nginx:1.27".into(),
                    env: BTreeMap::from([("MODE".into(), "prod".into())]),
                    ports: vec![ContainerPort {
                        name: Some("web".into()),
                        container_port: 8080,
                        protocol: Some("TCP".into()),
                    }],
                    ..Default::default()
                },
                service_port: 80,
                autoscaling,
            },
        );
        service.metadata.namespace = Some("ns".into());
        service.metadata.uid = Some("uid-1".into());
        service
    }

    #[test]
    fn test_child_names_are_deterministic() {
        let service = make_service("foo", None);
        assert_eq!(deployment_name(&service), deployment_name(&service.clone()));
        assert_eq!(deployment_key(&service), Key::new("ns", "foo-deployment"));
        assert_eq!(k8s_service_key(&service), Key::new("ns", "foo-service"));
        assert_eq!(
            autoscale_policy_key(&service),
            Key::new("ns", "foo-autoscalepolicy")
        );
    }

    #[test]
    fn test_child_names_are_distinct_per_kind_and_service() {
        let foo = make_service("foo", None);
        let bar = make_service("bar", None);
        let names = [
            deployment_name(&foo),
            k8s_service_name(&foo),
            autoscale_policy_name(&foo),
        ];
        assert_ne!(names[0], names[1]);
        assert_ne!(names[1], names[2]);
        assert_ne!(names[0], names[2]);
        assert_ne!(deployment_name(&foo), deployment_name(&bar));
    }

    #[test]
    fn test_deployment_selector_matches_template() {
        let service = make_service("foo", None);
        let deployment = create_deployment(&service);
        let spec = deployment.spec.expect("spec");
        let template_labels = spec.template.metadata.and_then(|m| m.labels);
        assert_eq!(spec.selector.match_labels, template_labels);
        assert_eq!(spec.replicas, Some(2));

        let pod = spec.template.spec.expect("pod spec");
        let container = &pod.containers[0];
        assert_eq!(container.image.as_deref(), Some("nginx:1.27"));
        assert_eq!(container.env.as_ref().map(Vec::len), Some(1));
        assert!(container.command.is_none());

        let owner = &deployment.metadata.owner_references.expect("owners")[0];
        assert_eq!(owner.kind, "Service");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_k8s_service_targets_container_port() {
        let service = make_service("foo", None);
        let k8s_service = create_k8s_service(&service);
        assert_eq!(k8s_service.metadata.name.as_deref(), Some("foo-service"));
        let port = &k8s_service.spec.expect("spec").ports.expect("ports")[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::Int(8080)));
    }

    #[test]
    fn test_desired_policy_variants() {
        let intent = AutoscalingIntent {
            min_replicas: 2,
            max_replicas: 10,
            metrics: vec![ResourceMetric {
                name: "memory".into(),
                target_average_utilization: 70,
            }],
        };
        let explicit = desired_autoscale_policy(&make_service("foo", Some(intent.clone())), false)
            .expect("explicit policy");
        assert_eq!(explicit.spec.max_replicas, 10);
        assert_eq!(explicit.spec.metrics, intent.metrics);
        assert_eq!(explicit.spec.scale_target_ref.name, "foo-deployment");
        assert_eq!(explicit.metadata.namespace.as_deref(), Some("ns"));

        let default = desired_autoscale_policy(&make_service("foo", None), true)
            .expect("default policy");
        assert_eq!(default.spec.min_replicas, 2);
        assert_eq!(default.spec.max_replicas, 2);
        assert_eq!(default.spec.metrics[0].name, "cpu");
        assert!(default.status.is_none());

        assert!(desired_autoscale_policy(&make_service("foo", None), false).is_none());
    }
}
