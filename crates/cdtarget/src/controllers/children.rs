use std::fmt;

use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::agent::configmap::config_map_name;
use crate::agent::network_policy::pool_network_policy_name;
use crate::agent::scaling::trigger_authentication_name;
use crate::api::v1alpha1::cdtarget::*;
use crate::assets::PORTS_CONFIG_MAP_NAME;
use crate::util::errors::{Error, ErrorWithRequeue, StdError};

/// How a child is treated once it exists
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Rewritten from the spec on every pass
    Always,
    /// Created once for the user to fill in, never owned and never touched again
    CreateOnceUnowned,
    /// Created once and owned; left alone afterwards so external scalers can mutate it
    CreateOnceOwned,
}

impl UpdatePolicy {
    pub fn owned(self) -> bool {
        !matches!(self, UpdatePolicy::CreateOnceUnowned)
    }
}

/// Every child resource of a CDTarget, in reconciliation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildKind {
    TokenSecret,
    ProxySecret,
    CaSecret,
    PortsConfigMap,
    AgentConfigMap,
    TargetNetworkPolicy,
    PoolNetworkPolicy,
    Deployment,
    ScaledObject,
    TriggerAuthentication,
}

/// Secrets come first so the references in the deployment resolve from the start.
pub const ORDER: [ChildKind; 10] = [
    ChildKind::TokenSecret,
    ChildKind::ProxySecret,
    ChildKind::CaSecret,
    ChildKind::PortsConfigMap,
    ChildKind::AgentConfigMap,
    ChildKind::TargetNetworkPolicy,
    ChildKind::PoolNetworkPolicy,
    ChildKind::Deployment,
    ChildKind::ScaledObject,
    ChildKind::TriggerAuthentication,
];

impl ChildKind {
    pub fn policy(self) -> UpdatePolicy {
        match self {
            ChildKind::TokenSecret | ChildKind::ProxySecret | ChildKind::CaSecret | ChildKind::PortsConfigMap => {
                UpdatePolicy::CreateOnceUnowned
            }
            ChildKind::AgentConfigMap | ChildKind::TargetNetworkPolicy | ChildKind::PoolNetworkPolicy => {
                UpdatePolicy::Always
            }
            ChildKind::Deployment | ChildKind::ScaledObject | ChildKind::TriggerAuthentication => {
                UpdatePolicy::CreateOnceOwned
            }
        }
    }

    /// Name of the child for `target`, `None` when the target does not ask for it.
    pub fn object_name(self, target: &CDTarget) -> Option<String> {
        let optional = |name: &str| (!name.is_empty()).then(|| name.to_string());
        match self {
            ChildKind::TokenSecret => Some(target.spec.token_ref.clone()),
            ChildKind::ProxySecret => optional(&target.spec.proxy_ref),
            ChildKind::CaSecret => optional(&target.spec.ca_cert_ref),
            ChildKind::PortsConfigMap => Some(PORTS_CONFIG_MAP_NAME.to_string()),
            ChildKind::AgentConfigMap => Some(config_map_name(target)),
            ChildKind::TargetNetworkPolicy | ChildKind::Deployment | ChildKind::ScaledObject => {
                Some(target.name_any())
            }
            ChildKind::PoolNetworkPolicy => Some(pool_network_policy_name(target)),
            ChildKind::TriggerAuthentication => Some(trigger_authentication_name(target)),
        }
    }

    /// Reason reported when the current state of the child cannot be read
    pub fn unavailable_reason(self) -> &'static str {
        match self {
            ChildKind::TokenSecret | ChildKind::ProxySecret | ChildKind::CaSecret => REASON_SECRET_NOT_AVAILABLE,
            ChildKind::PortsConfigMap | ChildKind::AgentConfigMap => REASON_CONFIG_MAP_NOT_AVAILABLE,
            ChildKind::TargetNetworkPolicy | ChildKind::PoolNetworkPolicy => REASON_NETWORK_POLICY_NOT_AVAILABLE,
            ChildKind::Deployment => REASON_DEPLOYMENT_NOT_AVAILABLE,
            ChildKind::ScaledObject => REASON_SCALED_OBJECT_NOT_AVAILABLE,
            ChildKind::TriggerAuthentication => REASON_TRIGGER_AUTHENTICATION_NOT_AVAILABLE,
        }
    }

    /// Reason reported when the child cannot be built, linked or written
    pub fn failed_reason(self) -> &'static str {
        match self {
            ChildKind::TokenSecret | ChildKind::ProxySecret | ChildKind::CaSecret => REASON_OPERAND_SECRET_FAILED,
            ChildKind::PortsConfigMap | ChildKind::AgentConfigMap => REASON_OPERAND_CONFIG_MAP_FAILED,
            ChildKind::TargetNetworkPolicy | ChildKind::PoolNetworkPolicy => REASON_OPERAND_NETWORK_POLICY_FAILED,
            ChildKind::Deployment => REASON_OPERAND_DEPLOYMENT_FAILED,
            ChildKind::ScaledObject => REASON_OPERAND_SCALED_OBJECT_FAILED,
            ChildKind::TriggerAuthentication => REASON_OPERAND_TRIGGER_AUTHENTICATION_FAILED,
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChildKind::TokenSecret => write!(f, "Token Secret"),
            ChildKind::ProxySecret => write!(f, "Proxy Secret"),
            ChildKind::CaSecret => write!(f, "CA Certificate Secret"),
            ChildKind::PortsConfigMap => write!(f, "ConfigMap {PORTS_CONFIG_MAP_NAME}"),
            ChildKind::AgentConfigMap => write!(f, "ConfigMap"),
            ChildKind::TargetNetworkPolicy => write!(f, "NetworkPolicy"),
            ChildKind::PoolNetworkPolicy => write!(f, "pool NetworkPolicy"),
            ChildKind::Deployment => write!(f, "Deployment"),
            ChildKind::ScaledObject => write!(f, "ScaledObject"),
            ChildKind::TriggerAuthentication => write!(f, "TriggerAuthentication"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Build,
    Link,
    Write,
}

/// The first fatal error of a pass, tagged with the child it happened on.
#[derive(Debug)]
pub struct ChildFailure {
    pub kind: ChildKind,
    pub stage: Stage,
    pub error: Error,
}

impl ChildFailure {
    pub fn new(kind: ChildKind, stage: Stage, error: impl Into<Error>) -> Self {
        Self {
            kind,
            stage,
            error: error.into(),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self.stage {
            Stage::Fetch => self.kind.unavailable_reason(),
            Stage::Build | Stage::Link | Stage::Write => self.kind.failed_reason(),
        }
    }

    pub fn message(&self) -> String {
        let kind = self.kind;
        let error = &self.error;
        match self.stage {
            Stage::Fetch => format!("unable to get operand {kind}: {error}"),
            Stage::Build => format!("unable to build operand {kind}: {error}"),
            Stage::Link => format!("unable to set owner reference on operand {kind}: {error}"),
            Stage::Write => format!("unable to configure operand {kind}: {error}"),
        }
    }

    /// Optimistic concurrency collisions are retried sooner than other failures.
    pub fn into_error(self) -> Error {
        let conflict = matches!(
            &self.error,
            Error::StdError(StdError::KubeError(kube::Error::Api(resp))) if resp.code == 409
        );
        match self.error {
            Error::StdError(e) if conflict => {
                Error::ErrorWithRequeue(ErrorWithRequeue::new(e, Duration::from_secs(5)))
            }
            other => other,
        }
    }
}

/// Brings one child in line with `desired` according to the policy of `kind`.
///
/// Returns the object as it is stored after the pass.
pub async fn converge<K>(api: &Api<K>, kind: ChildKind, mut desired: K) -> Result<(Outcome, K), ChildFailure>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + fmt::Debug + Serialize + DeserializeOwned,
{
    let name = desired.name_any();

    let existing = match api.get(&name).await {
        Ok(existing) => Some(existing),
        Err(kube::Error::Api(err)) if err.code == 404 => None,
        Err(e) => return Err(ChildFailure::new(kind, Stage::Fetch, e)),
    };

    match existing {
        None => {
            info!("Creating {} '{}'", kind, name);
            let created = api
                .create(&PostParams::default(), &desired)
                .await
                .map_err(|e| ChildFailure::new(kind, Stage::Write, e))?;
            Ok((Outcome::Created, created))
        }
        Some(existing) if kind.policy() == UpdatePolicy::Always => {
            info!("Updating {} '{}'", kind, name);
            desired.meta_mut().resource_version = existing.resource_version();
            let updated = api
                .replace(&name, &PostParams::default(), &desired)
                .await
                .map_err(|e| ChildFailure::new(kind, Stage::Write, e))?;
            Ok((Outcome::Updated, updated))
        }
        Some(existing) => {
            debug!("{} '{}' exists, leaving it untouched", kind, name);
            Ok((Outcome::Unchanged, existing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fixtures;

    #[test]
    fn test_update_policies() {
        let always: Vec<_> = ORDER.iter().filter(|k| k.policy() == UpdatePolicy::Always).collect();
        assert_eq!(
            always,
            vec![
                &ChildKind::AgentConfigMap,
                &ChildKind::TargetNetworkPolicy,
                &ChildKind::PoolNetworkPolicy
            ]
        );

        for kind in [ChildKind::TokenSecret, ChildKind::ProxySecret, ChildKind::CaSecret] {
            assert!(!kind.policy().owned(), "{kind} must not be owned");
        }
        for kind in [
            ChildKind::Deployment,
            ChildKind::ScaledObject,
            ChildKind::TriggerAuthentication,
        ] {
            assert_eq!(kind.policy(), UpdatePolicy::CreateOnceOwned);
        }
    }

    #[test]
    fn test_secrets_precede_their_consumers() {
        let position = |kind| ORDER.iter().position(|k| *k == kind).unwrap();
        assert!(position(ChildKind::TokenSecret) < position(ChildKind::Deployment));
        assert!(position(ChildKind::ProxySecret) < position(ChildKind::Deployment));
        assert!(position(ChildKind::CaSecret) < position(ChildKind::Deployment));
        assert!(position(ChildKind::PortsConfigMap) < position(ChildKind::TargetNetworkPolicy));
    }

    #[test]
    fn test_object_names() {
        let mut target = fixtures::target();
        assert_eq!(ChildKind::ProxySecret.object_name(&target), None);
        assert_eq!(ChildKind::CaSecret.object_name(&target), None);

        target.spec.proxy_ref = "azp-proxy".to_string();
        let names: Vec<_> = ORDER.iter().filter_map(|k| k.object_name(&target)).collect();
        assert_eq!(
            names,
            vec![
                "azp-token",
                "azp-proxy",
                "cdtarget-ports",
                "agents-config",
                "agents",
                "agents-pool",
                "agents",
                "agents",
                "linux-trigger-auth"
            ]
        );
    }

    #[test]
    fn test_failure_reason_by_stage() {
        let missing = || StdError::MetadataMissing("uid".to_string());

        let fetch = ChildFailure::new(ChildKind::Deployment, Stage::Fetch, missing());
        assert_eq!(fetch.reason(), REASON_DEPLOYMENT_NOT_AVAILABLE);

        let write = ChildFailure::new(ChildKind::AgentConfigMap, Stage::Write, missing());
        assert_eq!(write.reason(), REASON_OPERAND_CONFIG_MAP_FAILED);
        assert!(write.message().starts_with("unable to configure operand ConfigMap"));

        let link = ChildFailure::new(ChildKind::TriggerAuthentication, Stage::Link, missing());
        assert_eq!(link.reason(), REASON_OPERAND_TRIGGER_AUTHENTICATION_FAILED);
    }
}
