//! Builders mapping a CDTarget spec onto the desired state of each child resource.
//!
//! Every builder is pure: the same target always yields the same object, which is
//! what makes rewriting the always-reconciled children on each pass safe.

pub mod configmap;
pub mod deployment;
pub mod network_policy;
pub mod ports;
pub mod scaling;
pub mod secrets;

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use kube::ResourceExt;

use crate::api::v1alpha1::cdtarget::CDTarget;

/// Metadata shared by the per-target children: same namespace, labeled with the selector.
pub(crate) fn child_meta(target: &CDTarget, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: target.namespace(),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use crate::api::v1alpha1::cdtarget::{AgentConfig, CDTarget, CDTargetSpec};

    pub fn target() -> CDTarget {
        let mut target = CDTarget::new(
            "agents",
            CDTargetSpec {
                ip: vec!["10.0.0.5".to_string()],
                additional_selector: BTreeMap::from([("app".to_string(), "agent".to_string())]),
                agent_image: "ghcr.io/example/azp-agent:2.0".to_string(),
                min_replica_count: Some(1),
                max_replica_count: Some(3),
                token_ref: "azp-token".to_string(),
                config: AgentConfig {
                    url: "https://dev.azure.com/example".to_string(),
                    pool_name: "linux".to_string(),
                    agent_name: "agent".to_string(),
                    work_dir: "/azp/_work".to_string(),
                    mtu_value: "1400".to_string(),
                },
                ..CDTargetSpec::default()
            },
        );
        target.metadata.namespace = Some("pipelines".to_string());
        target
    }
}
