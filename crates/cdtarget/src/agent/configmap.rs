use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use crate::agent::child_meta;
use crate::api::v1alpha1::cdtarget::CDTarget;

pub const AZP_URL: &str = "AZP_URL";
pub const AZP_POOL: &str = "AZP_POOL";
pub const AZP_WORK: &str = "AZP_WORK";
pub const AZP_AGENT_NAME: &str = "AZP_AGENT_NAME";
pub const AGENT_MTU_VALUE: &str = "AGENT_MTU_VALUE";

pub fn config_map_name(target: &CDTarget) -> String {
    format!("{}-config", target.name_any())
}

/// Agent settings consumed by the deployment through `configMapKeyRef`s
pub fn desired_config_map(target: &CDTarget) -> ConfigMap {
    let config = &target.spec.config;
    let data = BTreeMap::from([
        (AZP_URL.to_string(), config.url.clone()),
        (AZP_POOL.to_string(), config.pool_name.clone()),
        (AZP_WORK.to_string(), config.work_dir.clone()),
        (AZP_AGENT_NAME.to_string(), config.agent_name.clone()),
        (AGENT_MTU_VALUE.to_string(), config.mtu_value.clone()),
    ]);

    ConfigMap {
        metadata: child_meta(
            target,
            config_map_name(target),
            target.spec.additional_selector.clone(),
        ),
        data: Some(data),
        ..ConfigMap::default()
    }
}
