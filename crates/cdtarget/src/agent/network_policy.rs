use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::ResourceExt;
use serde_json::{json, Value};

use crate::api::v1alpha1::cdtarget::CDTarget;
use crate::assets;
use crate::util::errors::{Result, StdError};

/// Port opened when the reference config map lists none, so an empty list never means "any port"
pub const FALLBACK_PORT: i32 = 1;

pub fn pool_network_policy_name(target: &CDTarget) -> String {
    format!("{}-pool", target.name_any())
}

/// Egress policy allowing the agent pods to reach exactly the target IPs on the reference ports.
pub fn desired_target_network_policy(target: &CDTarget, ports: &[i32]) -> Result<NetworkPolicy> {
    let peers: Vec<Value> = target
        .spec
        .ip
        .iter()
        .map(|ip| json!({ "ipBlock": { "cidr": format!("{ip}/32") } }))
        .collect();

    let ports = if ports.is_empty() { &[FALLBACK_PORT][..] } else { ports };
    let ports: Vec<Value> = ports
        .iter()
        .flat_map(|port| {
            [
                json!({ "port": port, "protocol": "TCP" }),
                json!({ "port": port, "protocol": "UDP" }),
            ]
        })
        .collect();

    let name = target.name_any();
    let policy = json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": {
            "name": name,
            "namespace": target.namespace(),
            "labels": { "name": name }
        },
        "spec": {
            "podSelector": { "matchLabels": target.spec.additional_selector },
            "policyTypes": ["Egress"],
            "egress": [{ "to": peers, "ports": ports }]
        }
    });

    serde_json::from_value(policy).map_err(|e| StdError::JsonSerializationError(e).into())
}

/// The bundled pool policy retargeted at this agent pool; its rules stay as bundled.
pub fn desired_pool_network_policy(target: &CDTarget) -> Result<NetworkPolicy> {
    let mut policy = serde_json::to_value(assets::pool_network_policy()).map_err(StdError::JsonSerializationError)?;

    policy["metadata"]["name"] = json!(pool_network_policy_name(target));
    policy["metadata"]["namespace"] = json!(target.namespace());
    policy["metadata"]["labels"] = json!(target.spec.additional_selector);
    policy["spec"]["podSelector"] = json!({ "matchLabels": target.spec.additional_selector });

    serde_json::from_value(policy).map_err(|e| StdError::JsonSerializationError(e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fixtures;
    use assert_json_diff::assert_json_eq;

    fn egress(policy: &NetworkPolicy) -> Value {
        serde_json::to_value(policy).unwrap()["spec"]["egress"].clone()
    }

    #[test]
    fn test_target_policy_allows_exact_ips_on_both_transports() {
        let mut target = fixtures::target();
        target.spec.ip = vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()];

        let policy = desired_target_network_policy(&target, &[8080, 8443]).unwrap();

        assert_json_eq!(
            egress(&policy),
            json!([{
                "to": [
                    { "ipBlock": { "cidr": "10.0.0.5/32" } },
                    { "ipBlock": { "cidr": "10.0.0.6/32" } }
                ],
                "ports": [
                    { "port": 8080, "protocol": "TCP" },
                    { "port": 8080, "protocol": "UDP" },
                    { "port": 8443, "protocol": "TCP" },
                    { "port": 8443, "protocol": "UDP" }
                ]
            }])
        );
    }

    #[test]
    fn test_target_policy_without_ports_uses_fallback_pair() {
        let policy = desired_target_network_policy(&fixtures::target(), &[]).unwrap();

        let ports = egress(&policy)[0]["ports"].clone();
        assert_json_eq!(
            ports,
            json!([
                { "port": FALLBACK_PORT, "protocol": "TCP" },
                { "port": FALLBACK_PORT, "protocol": "UDP" }
            ])
        );
    }

    #[test]
    fn test_target_policy_metadata_and_selector() {
        let policy = desired_target_network_policy(&fixtures::target(), &[443]).unwrap();
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(value["metadata"]["name"], "agents");
        assert_eq!(value["metadata"]["namespace"], "pipelines");
        assert_eq!(value["metadata"]["labels"], json!({ "name": "agents" }));
        assert_eq!(value["spec"]["podSelector"], json!({ "matchLabels": { "app": "agent" } }));
        assert_eq!(value["spec"]["policyTypes"], json!(["Egress"]));
    }

    #[test]
    fn test_target_policy_is_deterministic() {
        let target = fixtures::target();
        assert_eq!(
            desired_target_network_policy(&target, &[443]).unwrap(),
            desired_target_network_policy(&target, &[443]).unwrap()
        );
    }

    #[test]
    fn test_pool_policy_overrides_identity_only() {
        let target = fixtures::target();
        let policy = desired_pool_network_policy(&target).unwrap();
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(value["metadata"]["name"], "agents-pool");
        assert_eq!(value["metadata"]["namespace"], "pipelines");
        assert_eq!(value["metadata"]["labels"], json!({ "app": "agent" }));
        assert_eq!(value["spec"]["podSelector"], json!({ "matchLabels": { "app": "agent" } }));
        assert_eq!(egress(&policy), egress(&assets::pool_network_policy()));
    }
}
