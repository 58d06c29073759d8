use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Api, ListParams, ResourceExt},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::{self, Config},
    },
    Resource,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::{sync::RwLock, time::Duration};
use tracing::*;

use crate::agent::ports::ports_from_config_map;
use crate::agent::{configmap, deployment, network_policy, scaling, secrets};
use crate::api::keda::{ScaledObject, TriggerAuthentication};
use crate::api::v1alpha1::cdtarget::{CDTarget, REASON_CR_NOT_AVAILABLE};
use crate::assets;
use crate::controllers::children::{converge, ChildFailure, ChildKind, Outcome, Stage, ORDER};
use crate::controllers::upgradeable;
use crate::util::config::OperatorConfig;
use crate::util::errors::{Error, Result, StdError};
use crate::util::metrics::Metrics;
use crate::util::owner::OwnerRegistry;
use crate::util::target_status::TargetStatusManager;

/// Reconciles the children of a single CDTarget in the fixed order of [`ORDER`]
struct ChildReconciler<'a> {
    target: &'a CDTarget,
    ctx: &'a Context,
    namespace: String,
}

impl<'a> ChildReconciler<'a> {
    fn new(target: &'a CDTarget, ctx: &'a Context) -> Result<Self> {
        let namespace = target
            .namespace()
            .ok_or_else(|| StdError::MetadataMissing(format!("namespace of CDTarget {}", target.name_any())))?;
        Ok(Self { target, ctx, namespace })
    }

    /// Runs every child in order and stops at the first fatal failure.
    async fn reconcile_all(&self) -> std::result::Result<(), ChildFailure> {
        let mut ports = Vec::new();
        for kind in ORDER {
            let outcome = self.apply(kind, &mut ports).await?;
            debug!("{} of {}: {:?}", kind, self.target.name_any(), outcome);
        }
        Ok(())
    }

    /// Reads the shared port list, creating the reference config map from the bundled default when absent.
    async fn reference_ports(&self) -> std::result::Result<(Outcome, Vec<i32>), ChildFailure> {
        let operator_namespace = &self.ctx.config.operator_namespace;
        let mut desired = assets::ports_config_map();
        desired.metadata.namespace = Some(operator_namespace.clone());

        let api: Api<ConfigMap> = Api::namespaced(self.ctx.client.clone(), operator_namespace);
        let (outcome, reference) = converge(&api, ChildKind::PortsConfigMap, desired).await?;

        let ports = ports_from_config_map(&reference).unwrap_or_else(|e| {
            error!("Failed to parse ports, falling back to the default port: {}", e);
            Vec::new()
        });
        Ok((outcome, ports))
    }

    /// Converges one child; the reference config map fills `ports` for the policies after it.
    async fn apply(&self, kind: ChildKind, ports: &mut Vec<i32>) -> std::result::Result<Outcome, ChildFailure> {
        if kind.object_name(self.target).is_none() {
            return Ok(Outcome::Skipped);
        }

        let target = self.target;
        let build = |e: Error| ChildFailure::new(kind, Stage::Build, e);
        match kind {
            ChildKind::TokenSecret => self.converge(kind, secrets::desired_token_secret(target)).await,
            ChildKind::ProxySecret => self.converge(kind, secrets::desired_proxy_secret(target)).await,
            ChildKind::CaSecret => self.converge(kind, secrets::desired_ca_secret(target)).await,
            ChildKind::AgentConfigMap => self.converge(kind, configmap::desired_config_map(target)).await,
            ChildKind::TargetNetworkPolicy => {
                let policy = network_policy::desired_target_network_policy(target, ports.as_slice()).map_err(build)?;
                self.converge(kind, policy).await
            }
            ChildKind::PoolNetworkPolicy => {
                let policy = network_policy::desired_pool_network_policy(target).map_err(build)?;
                self.converge(kind, policy).await
            }
            ChildKind::Deployment => self.converge(kind, deployment::desired_deployment(target)).await,
            ChildKind::ScaledObject => self.converge(kind, scaling::desired_scaled_object(target)).await,
            ChildKind::TriggerAuthentication => {
                self.converge(kind, scaling::desired_trigger_authentication(target)).await
            }
            ChildKind::PortsConfigMap => {
                let (outcome, reference_ports) = self.reference_ports().await?;
                *ports = reference_ports;
                Ok(outcome)
            }
        }
    }

    async fn converge<K>(&self, kind: ChildKind, mut desired: K) -> std::result::Result<Outcome, ChildFailure>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + std::fmt::Debug
            + Serialize
            + DeserializeOwned,
    {
        if kind.policy().owned() {
            self.ctx
                .registry
                .set_controller_reference(self.target, &mut desired)
                .map_err(|e| ChildFailure::new(kind, Stage::Link, e))?;
        }

        let api: Api<K> = Api::namespaced(self.ctx.client.clone(), &self.namespace);
        let (outcome, _) = converge(&api, kind, desired).await?;
        Ok(outcome)
    }
}

impl CDTarget {
    /// One pass over the children of a freshly read CDTarget
    pub async fn reconcile(&self, ctx: Arc<Context>) -> Result<Action> {
        let status = TargetStatusManager::new(&ctx.client, self);
        let children = ChildReconciler::new(self, &ctx)?;

        if let Err(failure) = children.reconcile_all().await {
            error!("{}", failure.message());
            let status_error = status
                .set_reconcile_failure(failure.reason(), &failure.message())
                .await
                .err();
            return Err(Error::aggregate(failure.into_error(), status_error));
        }

        status.set_reconcile_success().await?;

        if upgradeable::supports_lifecycle_reporting(&ctx.client, &ctx.config).await {
            upgradeable::report_upgradeable(&ctx.client, &ctx.config).await?;
        }

        Ok(Action::requeue(ctx.config.requeue_after))
    }
}

/// State shared between the controller and the web server
#[derive(Clone, Default)]
pub struct State {
    /// Diagnostics populated by the reconciler
    diagnostics: Arc<RwLock<Diagnostics>>,
    /// Metrics registry
    registry: prometheus::Registry,
}

/// State wrapper around the controller outputs for the web server
impl State {
    /// Metrics getter
    pub fn metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// State getter
    pub async fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.read().await.clone()
    }

    // Create a Controller Context that can update State
    pub fn to_context(&self, client: Client, config: OperatorConfig) -> Result<Arc<Context>, prometheus::Error> {
        Ok(Arc::new(Context {
            client,
            metrics: Metrics::new()?.register(&self.registry)?,
            diagnostics: self.diagnostics.clone(),
            config,
            registry: OwnerRegistry::new().register::<CDTarget>(),
        }))
    }
}

// Context for our reconciler
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Diagnostics read by the web server
    pub diagnostics: Arc<RwLock<Diagnostics>>,
    /// Prometheus metrics
    pub metrics: Metrics,
    pub config: OperatorConfig,
    /// Types allowed to own children
    pub registry: OwnerRegistry,
}

#[instrument(skip(ctx, target), fields(name = %target.name_any(), namespace = ?target.namespace()))]
pub async fn reconcile(target: Arc<CDTarget>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = ctx.metrics.count_and_measure("cdtarget");
    ctx.diagnostics.write().await.last_event = Utc::now();

    let name = target.name_any();
    let ns = target
        .namespace()
        .ok_or_else(|| StdError::MetadataMissing(format!("namespace of CDTarget {name}")))?;
    let targets: Api<CDTarget> = Api::namespaced(ctx.client.clone(), &ns);

    info!("Reconciling CDTarget \"{}\" in {}", name, ns);
    let current = match targets.get(&name).await {
        Ok(current) => current,
        Err(kube::Error::Api(err)) if err.code == 404 => {
            info!("CDTarget {} not found, it must have been deleted", name);
            return Ok(Action::await_change());
        }
        Err(e) => {
            error!("Error getting CDTarget {}: {}", name, e);
            let message = format!("unable to get operator custom resource: {e}");
            let status_error = TargetStatusManager::new(&ctx.client, &target)
                .set_reconcile_failure(REASON_CR_NOT_AVAILABLE, &message)
                .await
                .err();
            return Err(Error::aggregate(e.into(), status_error));
        }
    };

    current.reconcile(ctx.clone()).await
}

/// Diagnostics to be exposed by the web server
#[derive(Clone, Serialize)]
pub struct Diagnostics {
    pub last_event: DateTime<Utc>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            last_event: Utc::now(),
        }
    }
}

fn error_policy(target: Arc<CDTarget>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!("reconcile failed: {:?}", error);
    ctx.metrics.reconcile_failure(&target, error);
    match error {
        Error::ErrorWithRequeue(e) => Action::requeue(e.duration),
        _ => Action::requeue(Duration::from_secs(60)),
    }
}

/// Initialize the controller and shared state (given the crd is installed)
pub async fn run(state: State, config: OperatorConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;

    let targets = Api::<CDTarget>::all(client.clone());
    if let Err(e) = targets.list(&ListParams::default().limit(1)).await {
        error!("CRD is not queryable; {e:?}. Is the CRD installed?");
        info!("Installation: cargo run --bin crdgen | kubectl apply -f -");
        anyhow::bail!("CDTarget CRD is not installed");
    }

    Controller::new(targets, Config::default().any_semantic())
        .owns(Api::<NetworkPolicy>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
        .owns(Api::<ConfigMap>::all(client.clone()), watcher::Config::default())
        .owns(Api::<ScaledObject>::all(client.clone()), watcher::Config::default())
        .owns(Api::<TriggerAuthentication>::all(client.clone()), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state.to_context(client, config)?)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
    Ok(())
}
