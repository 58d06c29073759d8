use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, LocalObjectReference, PodDNSConfig, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::conditions_schema;

/// Condition type carrying the outcome of the last reconciliation
pub const RECONCILE_SUCCESS: &str = "ReconcileSuccess";

// Machine readable reasons set on the `ReconcileSuccess` condition
pub const REASON_CR_NOT_AVAILABLE: &str = "OperatorResourceNotAvailable";
pub const REASON_NETWORK_POLICY_NOT_AVAILABLE: &str = "OperandNetworkPolicyNotAvailable";
pub const REASON_OPERAND_NETWORK_POLICY_FAILED: &str = "OperandNetworkPolicyFailed";
pub const REASON_CONFIG_MAP_NOT_AVAILABLE: &str = "ConfigMapNotAvailable";
pub const REASON_OPERAND_CONFIG_MAP_FAILED: &str = "OperandConfigMapFailed";
pub const REASON_DEPLOYMENT_NOT_AVAILABLE: &str = "DeploymentNotAvailable";
pub const REASON_OPERAND_DEPLOYMENT_FAILED: &str = "OperandDeploymentFailed";
pub const REASON_SECRET_NOT_AVAILABLE: &str = "SecretNotAvailable";
pub const REASON_OPERAND_SECRET_FAILED: &str = "OperandSecretFailed";
pub const REASON_SCALED_OBJECT_NOT_AVAILABLE: &str = "ScaledObjectNotAvailable";
pub const REASON_OPERAND_SCALED_OBJECT_FAILED: &str = "OperandScaledObjectFailed";
pub const REASON_TRIGGER_AUTHENTICATION_NOT_AVAILABLE: &str = "TriggerAuthenticationNotAvailable";
pub const REASON_OPERAND_TRIGGER_AUTHENTICATION_FAILED: &str = "OperandTriggerAuthenticationFailed";
pub const REASON_SUCCEEDED: &str = "OperatorSucceeded";

/// Generate the Kubernetes wrapper struct `CDTarget` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "CDTarget", group = "cnad.gofound.nl", version = "v1alpha1", namespaced)]
#[kube(status = "CDTargetStatus", shortname = "cdt")]
#[serde(rename_all = "camelCase")]
pub struct CDTargetSpec {
    /// IPs the agents may reach; each one becomes a /32 egress peer
    #[serde(default)]
    pub ip: Vec<String>,
    /// Labels identifying the agent pods, also stamped on every generated object
    pub additional_selector: BTreeMap<String, String>,
    /// Pipeline agent image
    #[serde(default)]
    pub agent_image: String,
    pub agent_resources: Option<ResourceRequirements>,
    #[serde(default)]
    pub image_pull_secrets: Vec<LocalObjectReference>,
    pub min_replica_count: Option<i32>,
    pub max_replica_count: Option<i32>,
    /// Additional environment variables appended to the agent container
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Secret holding the proxy settings
    #[serde(default)]
    pub proxy_ref: String,
    /// Secret holding the personal access token
    pub token_ref: String,
    /// Secret holding additional CA certificates
    #[serde(default)]
    pub ca_cert_ref: String,
    #[serde(default)]
    pub config: AgentConfig,
    /// Added to, or overriding, the default scaled object trigger metadata
    #[serde(default)]
    pub trigger_meta: BTreeMap<String, String>,
    pub dns_config: Option<PodDNSConfig>,
    pub dns_policy: Option<String>,
}

/// Pool and work directory settings handed to the agent through its config map
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub url: String,
    pub pool_name: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub work_dir: String,
    /// MTU for networks used by container jobs, useful for docker-in-docker
    #[serde(default)]
    pub mtu_value: String,
}

/// The status object of `CDTarget`
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
pub struct CDTargetStatus {
    #[serde(default)]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<Condition>,
}

impl CDTarget {
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
    }
}
