//! Reports upgradeability to the Operator Lifecycle Manager when it manages this operator.

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info};

use crate::api::olm::{OperatorCondition, UPGRADEABLE};
use crate::util::config::OperatorConfig;
use crate::util::errors::{Result, StdError};
use crate::util::status::{new_condition, set_status_condition};

pub const OLM_OWNER_ANNOTATION: &str = "olm.owner";
pub const REASON_UPGRADEABLE: &str = "OperatorUpgradeable";
pub const MESSAGE_UPGRADEABLE: &str = "The operator is currently upgradeable";

/// True when the operator deployment was installed by OLM.
///
/// Any failure to read the deployment counts as "not managed".
pub async fn supports_lifecycle_reporting(client: &Client, config: &OperatorConfig) -> bool {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &config.operator_namespace);
    match deployments.get(&config.operator_deployment).await {
        Ok(deployment) => deployment
            .annotations()
            .get(OLM_OWNER_ANNOTATION)
            .is_some_and(|owner| !owner.is_empty()),
        Err(e) => {
            debug!(
                "Operator deployment {} not readable, skipping OLM reporting: {}",
                config.operator_deployment, e
            );
            false
        }
    }
}

/// Upserts a condition into the spec of the OperatorCondition OLM created for this operator.
pub async fn report(
    client: &Client,
    config: &OperatorConfig,
    condition_type: &str,
    status: bool,
    reason: &str,
    message: &str,
) -> Result<()> {
    let name = config
        .operator_condition_name
        .as_deref()
        .ok_or_else(|| StdError::MetadataMissing("OPERATOR_CONDITION_NAME is not set".to_string()))?;
    let api: Api<OperatorCondition> = Api::namespaced(client.clone(), &config.operator_namespace);

    let mut operator_condition = api.get(name).await?;
    let condition = new_condition(
        condition_type,
        status,
        reason,
        message,
        operator_condition.metadata.generation,
    );
    let (conditions, changed) = set_status_condition(&operator_condition.spec.conditions, condition);
    if !changed {
        return Ok(());
    }

    operator_condition.spec.conditions = conditions;
    api.replace(name, &PostParams::default(), &operator_condition).await?;
    info!("Reported {}={} on OperatorCondition {}", condition_type, status, name);
    Ok(())
}

pub async fn report_upgradeable(client: &Client, config: &OperatorConfig) -> Result<()> {
    report(client, config, UPGRADEABLE, true, REASON_UPGRADEABLE, MESSAGE_UPGRADEABLE).await
}
