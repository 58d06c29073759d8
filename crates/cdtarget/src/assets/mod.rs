//! Default child resources compiled into the operator binary

use std::sync::LazyLock;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use serde::de::DeserializeOwned;

pub const PORTS_CONFIG_MAP_NAME: &str = "cdtarget-ports";

const PORTS_CONFIG_MAP: &str = include_str!("../../assets/manifests/cdtarget_ports.yaml");
const POOL_NETWORK_POLICY: &str = include_str!("../../assets/manifests/az-pipelines-pool.yaml");

static PORTS_CONFIG_MAP_TEMPLATE: LazyLock<ConfigMap> = LazyLock::new(|| load(PORTS_CONFIG_MAP, "cdtarget_ports.yaml"));
static POOL_NETWORK_POLICY_TEMPLATE: LazyLock<NetworkPolicy> =
    LazyLock::new(|| load(POOL_NETWORK_POLICY, "az-pipelines-pool.yaml"));

// The manifests are part of the build, a malformed one can only be a packaging bug.
fn load<T: DeserializeOwned>(manifest: &str, file: &str) -> T {
    serde_yaml::from_str(manifest).unwrap_or_else(|e| panic!("bundled manifest {file} is malformed: {e}"))
}

/// The shared config map listing the ports agents may reach on allow-listed IPs.
pub fn ports_config_map() -> ConfigMap {
    PORTS_CONFIG_MAP_TEMPLATE.clone()
}

/// Egress policy every agent pool gets regardless of its target IPs.
pub fn pool_network_policy() -> NetworkPolicy {
    POOL_NETWORK_POLICY_TEMPLATE.clone()
}
