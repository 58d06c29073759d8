use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use crate::api::v1alpha1::cdtarget::{CDTarget, REASON_SUCCEEDED, RECONCILE_SUCCESS};
use crate::util::errors::{Result, StdError};
use crate::util::status::{new_condition, set_status_condition};

// Field manager for status updates
pub const STATUS_FIELD_MANAGER: &str = "cdtarget-status-manager";

pub const SUCCESS_MESSAGE: &str = "operator successfully reconciling";

/// Maintains the `ReconcileSuccess` condition of a single CDTarget.
///
/// Conditions are computed from the object handed to the reconciler and written
/// back through the status subresource; the spec is never touched.
pub struct TargetStatusManager<'a> {
    target: &'a CDTarget,
    client: kube::Client,
}

impl<'a> TargetStatusManager<'a> {
    pub fn new(client: &kube::Client, target: &'a CDTarget) -> Self {
        Self {
            target,
            client: client.clone(),
        }
    }

    pub async fn set_reconcile_success(&self) -> Result<Vec<Condition>> {
        self.set_reconcile_condition(true, REASON_SUCCEEDED, SUCCESS_MESSAGE).await
    }

    pub async fn set_reconcile_failure(&self, reason: &str, message: &str) -> Result<Vec<Condition>> {
        self.set_reconcile_condition(false, reason, message).await
    }

    async fn set_reconcile_condition(&self, status: bool, reason: &str, message: &str) -> Result<Vec<Condition>> {
        let condition = new_condition(
            RECONCILE_SUCCESS,
            status,
            reason,
            message,
            self.target.meta().generation,
        );
        let (conditions, changed) = set_status_condition(self.target.conditions(), condition);
        if !changed {
            debug!("ReconcileSuccess condition of {} unchanged", self.target.name_any());
        }

        self.persist(&conditions).await?;
        info!(
            "Set {} condition of {} to {} ({})",
            RECONCILE_SUCCESS,
            self.target.name_any(),
            status,
            reason
        );
        Ok(conditions)
    }

    async fn persist(&self, conditions: &[Condition]) -> Result<()> {
        let name = self.target.name_any();
        let namespace = self
            .target
            .namespace()
            .ok_or_else(|| StdError::MetadataMissing(format!("namespace of CDTarget {name}")))?;
        let api: Api<CDTarget> = Api::namespaced(self.client.clone(), &namespace);

        let patch = Patch::Apply(json!({
            "apiVersion": "cnad.gofound.nl/v1alpha1",
            "kind": "CDTarget",
            "metadata": {
                "name": name,
                "namespace": namespace
            },
            "status": {
                "conditions": conditions
            }
        }));

        let patch_params = PatchParams::apply(STATUS_FIELD_MANAGER).force();
        api.patch_status(&name, &patch_params, &patch).await?;
        Ok(())
    }
}
