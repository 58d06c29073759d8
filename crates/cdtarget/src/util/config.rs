use anyhow::{Context, Result};
use std::env;
use tokio::time::Duration;

pub const DEFAULT_OPERATOR_NAMESPACE: &str = "cdtarget-operator";
pub const DEFAULT_OPERATOR_DEPLOYMENT: &str = "cdtarget-controller-manager";

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Namespace the operator runs in; holds the shared `cdtarget-ports` config map
    pub operator_namespace: String,
    /// Name of the operator's own deployment, inspected for the `olm.owner` annotation
    pub operator_deployment: String,
    /// OperatorCondition object injected by OLM, if any
    pub operator_condition_name: Option<String>,
    pub metrics_bind_address: String,
    pub requeue_after: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            operator_deployment: DEFAULT_OPERATOR_DEPLOYMENT.to_string(),
            operator_condition_name: None,
            metrics_bind_address: "0.0.0.0:8080".to_string(),
            requeue_after: Duration::from_secs(5 * 60),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let requeue_after = match env::var("REQUEUE_AFTER_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("REQUEUE_AFTER_SECS is not a number of seconds: {secs}"))?,
            ),
            Err(_) => defaults.requeue_after,
        };

        Ok(OperatorConfig {
            operator_namespace: env::var("OPERATOR_NAMESPACE").unwrap_or(defaults.operator_namespace),
            operator_deployment: env::var("OPERATOR_DEPLOYMENT").unwrap_or(defaults.operator_deployment),
            operator_condition_name: env::var("OPERATOR_CONDITION_NAME")
                .ok()
                .filter(|name| !name.is_empty()),
            metrics_bind_address: env::var("METRICS_BIND_ADDRESS").unwrap_or(defaults.metrics_bind_address),
            requeue_after,
        })
    }
}
