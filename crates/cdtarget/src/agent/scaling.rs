use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::agent::child_meta;
use crate::agent::configmap::AZP_URL;
use crate::agent::secrets::AZP_TOKEN;
use crate::api::keda::{
    AuthenticationRef, ScaleTargetRef, ScaleTrigger, ScaledObject, ScaledObjectSpec, SecretTargetRef,
    TriggerAuthentication, TriggerAuthenticationSpec,
};
use crate::api::v1alpha1::cdtarget::CDTarget;

pub const AZURE_PIPELINES_TRIGGER: &str = "azure-pipelines";
pub const PERSONAL_ACCESS_TOKEN: &str = "personalAccessToken";

pub fn trigger_authentication_name(target: &CDTarget) -> String {
    format!("{}-trigger-auth", target.spec.config.pool_name)
}

fn trigger_metadata(target: &CDTarget) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::from([
        ("poolName".to_string(), target.spec.config.pool_name.clone()),
        ("organizationURLFromEnv".to_string(), AZP_URL.to_string()),
    ]);
    metadata.extend(target.spec.trigger_meta.clone());
    metadata
}

/// Scales the agent deployment on the length of the Azure Pipelines queue
pub fn desired_scaled_object(target: &CDTarget) -> ScaledObject {
    let spec = &target.spec;
    let mut scaled_object = ScaledObject::new(
        &target.name_any(),
        ScaledObjectSpec {
            scale_target_ref: ScaleTargetRef {
                name: target.name_any(),
            },
            min_replica_count: spec.min_replica_count,
            max_replica_count: spec.max_replica_count,
            triggers: vec![ScaleTrigger {
                type_: AZURE_PIPELINES_TRIGGER.to_string(),
                metadata: trigger_metadata(target),
                authentication_ref: Some(AuthenticationRef {
                    name: trigger_authentication_name(target),
                }),
            }],
        },
    );
    scaled_object.metadata = child_meta(target, target.name_any(), spec.additional_selector.clone());
    scaled_object
}

/// Hands the token secret to the trigger under the parameter the scaler expects
pub fn desired_trigger_authentication(target: &CDTarget) -> TriggerAuthentication {
    let name = trigger_authentication_name(target);
    let mut auth = TriggerAuthentication::new(
        &name,
        TriggerAuthenticationSpec {
            secret_target_ref: vec![SecretTargetRef {
                parameter: PERSONAL_ACCESS_TOKEN.to_string(),
                name: target.spec.token_ref.clone(),
                key: AZP_TOKEN.to_string(),
            }],
        },
    );
    auth.metadata = child_meta(target, name, target.spec.additional_selector.clone());
    auth
}
