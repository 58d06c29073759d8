use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, ExecAction, Lifecycle, LifecycleHandler, PodSpec,
    PodTemplateSpec, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::agent::child_meta;
use crate::agent::configmap::{config_map_name, AGENT_MTU_VALUE, AZP_AGENT_NAME, AZP_POOL, AZP_URL, AZP_WORK};
use crate::agent::secrets::{AZP_TOKEN, PROXY_KEYS};
use crate::api::v1alpha1::cdtarget::CDTarget;

pub const AGENT_CONTAINER: &str = "agent";
pub const CA_CERTIFICATES_PATH: &str = "/usr/local/share/ca-certificates";

fn from_config_map(var: &str, config_map: &str, optional: bool) -> EnvVar {
    EnvVar {
        name: var.to_string(),
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: config_map.to_string(),
                key: var.to_string(),
                optional: Some(optional),
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

fn from_secret(var: &str, secret: &str, optional: bool) -> EnvVar {
    EnvVar {
        name: var.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: var.to_string(),
                optional: Some(optional),
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

/// Container environment, all sourced by reference; user supplied variables go last.
fn agent_env(target: &CDTarget) -> Vec<EnvVar> {
    let spec = &target.spec;
    let config_map = config_map_name(target);

    let mut env = vec![
        from_config_map(AZP_URL, &config_map, false),
        from_config_map(AZP_POOL, &config_map, false),
        from_config_map(AZP_WORK, &config_map, true),
        from_config_map(AZP_AGENT_NAME, &config_map, true),
        from_config_map(AGENT_MTU_VALUE, &config_map, true),
        from_secret(AZP_TOKEN, &spec.token_ref, false),
    ];

    if !spec.proxy_ref.is_empty() {
        env.extend(PROXY_KEYS.iter().map(|key| from_secret(key, &spec.proxy_ref, true)));
    }

    env.extend(spec.env.iter().cloned());
    env
}

fn agent_container(target: &CDTarget) -> Container {
    let spec = &target.spec;
    let mut container = Container {
        name: AGENT_CONTAINER.to_string(),
        image: (!spec.agent_image.is_empty()).then(|| spec.agent_image.clone()),
        env: Some(agent_env(target)),
        resources: spec.agent_resources.clone(),
        ..Container::default()
    };

    if !spec.ca_cert_ref.is_empty() {
        container.volume_mounts = Some(vec![VolumeMount {
            name: spec.ca_cert_ref.clone(),
            mount_path: CA_CERTIFICATES_PATH.to_string(),
            read_only: Some(true),
            ..VolumeMount::default()
        }]);
        container.lifecycle = Some(Lifecycle {
            post_start: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(vec![
                        "/bin/sh".to_string(),
                        "-c".to_string(),
                        "update-ca-certificates".to_string(),
                    ]),
                }),
                ..LifecycleHandler::default()
            }),
            ..Lifecycle::default()
        });
    }

    container
}

pub fn desired_deployment(target: &CDTarget) -> Deployment {
    let spec = &target.spec;
    let labels = spec.additional_selector.clone();

    let volumes = (!spec.ca_cert_ref.is_empty()).then(|| {
        vec![Volume {
            name: spec.ca_cert_ref.clone(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(spec.ca_cert_ref.clone()),
                optional: Some(true),
                ..SecretVolumeSource::default()
            }),
            ..Volume::default()
        }]
    });

    Deployment {
        metadata: child_meta(target, target.name_any(), labels.clone()),
        spec: Some(DeploymentSpec {
            replicas: spec.min_replica_count,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![agent_container(target)],
                    dns_config: spec.dns_config.clone(),
                    dns_policy: spec.dns_policy.clone(),
                    image_pull_secrets: (!spec.image_pull_secrets.is_empty())
                        .then(|| spec.image_pull_secrets.clone()),
                    volumes,
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}
