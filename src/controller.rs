use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, reflector::Store, watcher, Controller},
    Api, Resource, ResourceExt,
};
use tokio::time::MissedTickBehavior;

use crate::{
    config::NetworkingConfig,
    error::{NetworkingError, NetworkingResult},
    networking::{
        DefaultSecurityGroupReconciler, EniInfo, NetworkingManager, PermissionRegistry,
        PodEndpoint, PodInfo, SecurityGroupManager,
    },
    store::{KubeBindingStore, KubePodInfoRepo, PodInfoRepo},
    tgb::{TargetGroupBinding, TargetType},
};

/// Cloud lookup of the network interfaces behind binding targets.
#[async_trait]
pub trait EniInfoProvider: Send + Sync {
    /// ENIs of the given pods keyed by pod name. Pods without a known ENI
    /// are left out.
    async fn resolve_pod_enis(&self, pods: &[PodInfo]) -> NetworkingResult<HashMap<String, EniInfo>>;

    /// Primary ENIs of the given nodes.
    async fn resolve_node_enis(&self, node_names: &[String]) -> NetworkingResult<Vec<EniInfo>>;
}

pub struct Context {
    pub config: NetworkingConfig,
    pub manager: Arc<NetworkingManager>,
    pub pods: Arc<dyn PodInfoRepo>,
    pub enis: Arc<dyn EniInfoProvider>,
}

impl Context {
    #[must_use]
    pub fn new(
        config: NetworkingConfig,
        manager: Arc<NetworkingManager>,
        pods: Arc<dyn PodInfoRepo>,
        enis: Arc<dyn EniInfoProvider>,
    ) -> Self {
        Self {
            config,
            manager,
            pods,
            enis,
        }
    }

    /// Wires the manager to the cluster: live bindings are read from
    /// `bindings`, pods through `client`.
    #[must_use]
    pub fn from_client(
        client: &kube::Client,
        bindings: Store<TargetGroupBinding>,
        config: NetworkingConfig,
        sg_manager: Arc<dyn SecurityGroupManager>,
        enis: Arc<dyn EniInfoProvider>,
    ) -> Self {
        let manager = NetworkingManager::new(
            &config,
            Arc::new(PermissionRegistry::new()),
            sg_manager.clone(),
            Arc::new(DefaultSecurityGroupReconciler::new(sg_manager)),
            Arc::new(KubeBindingStore::new(bindings)),
        );
        Self::new(
            config,
            Arc::new(manager),
            Arc::new(KubePodInfoRepo::new(client.clone())),
            enis,
        )
    }
}

/// Runs the binding controller and the periodic garbage collection until
/// the controller stream ends. The controller's watch cache doubles as the
/// binding store.
pub async fn run(
    client: kube::Client,
    config: NetworkingConfig,
    sg_manager: Arc<dyn SecurityGroupManager>,
    enis: Arc<dyn EniInfoProvider>,
) {
    let controller = Controller::new(
        Api::<TargetGroupBinding>::all(client.clone()),
        watcher::Config::default(),
    );
    let context = Arc::new(Context::from_client(
        &client,
        controller.store(),
        config,
        sg_manager,
        enis,
    ));

    let gc = tokio::spawn(garbage_collection_loop(
        context.manager.clone(),
        context.config.gc_interval(),
        context.config.gc_timeout(),
    ));

    tracing::info!("Starting the binding controller");
    controller
        .run(reconcile_binding, on_error, context)
        .for_each(|reconcilation_result| async move {
            match reconcilation_result {
                Ok((binding, _action)) => {
                    tracing::info!("Reconcilation of a binding {} was successful", binding.name);
                }
                Err(err) => {
                    tracing::error!("Error reconciling binding: {:#?}", err);
                }
            }
        })
        .await;
    gc.abort();
}

/// Reconcile the network policy of a binding.
///
/// Deleted bindings are left alone: their rules are revoked by garbage
/// collection once the binding is gone from the cluster.
#[tracing::instrument(skip(tgb, context), fields(binding = tgb.name_any()))]
pub async fn reconcile_binding(
    tgb: Arc<TargetGroupBinding>,
    context: Arc<Context>,
) -> NetworkingResult<Action> {
    if tgb.meta().deletion_timestamp.is_some() {
        tracing::debug!("Binding is being deleted. Skipping...");
        return Ok(Action::await_change());
    }

    if tgb.spec.networking.is_none() {
        context.manager.reconcile_for_pod_endpoints(&tgb, &[]).await?;
        return Ok(Action::requeue(context.config.requeue()));
    }

    tracing::info!("Starting binding reconcilation");
    let pods = context.pods.list_pods(&tgb).await?;
    match tgb.spec.target_type.unwrap_or_default() {
        TargetType::Ip => {
            let mut enis = context.enis.resolve_pod_enis(&pods).await?;
            let endpoints = pods
                .into_iter()
                .filter_map(|pod| {
                    let Some(eni) = enis.remove(&pod.name) else {
                        tracing::debug!("No ENI found for pod {}. Skipping...", pod.name);
                        return None;
                    };
                    Some(PodEndpoint { pod, eni })
                })
                .collect::<Vec<_>>();
            context
                .manager
                .reconcile_for_pod_endpoints(&tgb, &endpoints)
                .await?;
        }
        TargetType::Instance => {
            let node_names = pods
                .iter()
                .filter_map(|pod| pod.node_name.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>();
            let enis = context.enis.resolve_node_enis(&node_names).await?;
            context
                .manager
                .reconcile_for_node_port_endpoints(&tgb, &enis)
                .await?;
        }
    }

    Ok(Action::requeue(context.config.requeue()))
}

/// Handle the error during reconcilation.
#[allow(clippy::needless_pass_by_value)]
fn on_error(tgb: Arc<TargetGroupBinding>, error: &NetworkingError, context: Arc<Context>) -> Action {
    tracing::warn!("Binding {} failed to reconcile: {}", tgb.name_any(), error);
    Action::requeue(context.config.requeue())
}

/// Runs garbage collection every `interval`. A failed or timed out sweep is
/// retried on the next tick.
pub async fn garbage_collection_loop(
    manager: Arc<NetworkingManager>,
    interval: Duration,
    timeout: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = run_garbage_collection(&manager, timeout).await {
            tracing::warn!("Garbage collection failed: {}", err);
        }
    }
}

/// One garbage collection sweep bounded by `timeout`.
pub async fn run_garbage_collection(
    manager: &NetworkingManager,
    timeout: Duration,
) -> NetworkingResult<()> {
    tokio::time::timeout(timeout, manager.attempt_garbage_collection()).await?
}
