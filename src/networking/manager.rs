use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use futures::future::{join_all, try_join_all};
use parking_lot::Mutex;

use super::{
    aggregate::PermissionsPerSg,
    compute::compute_permissions,
    endpoint_sg::EndpointSgResolver,
    permission::{tgb_networking_labels, IpPermissionInfo},
    ports::PodInfo,
    registry::{PermissionRegistry, View},
    sg_manager::{EniInfo, SecurityGroupFilter, SecurityGroupManager},
    sg_reconciler::{ReconcileOptions, SecurityGroupReconciler},
};
use crate::{
    config::NetworkingConfig,
    consts,
    error::{NetworkingError, NetworkingResult},
    store::BindingStore,
    tgb::{BindingKey, TargetGroupBinding, TargetGroupBindingNetworking},
};

/// A pod endpoint of a binding and the ENI carrying its traffic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodEndpoint {
    pub pod: PodInfo,
    pub eni: EniInfo,
}

/// Keeps security group ingress rules in line with the network policies
/// of every binding in the cluster.
pub struct NetworkingManager {
    registry: Arc<PermissionRegistry>,
    sg_manager: Arc<dyn SecurityGroupManager>,
    sg_reconciler: Arc<dyn SecurityGroupReconciler>,
    bindings: Arc<dyn BindingStore>,
    endpoint_sg_resolver: EndpointSgResolver,
    sg_locks: SgLocks,
    cluster_name: String,
    vpc_id: String,
    restricted_sg_rules: bool,
}

impl NetworkingManager {
    #[must_use]
    pub fn new(
        config: &NetworkingConfig,
        registry: Arc<PermissionRegistry>,
        sg_manager: Arc<dyn SecurityGroupManager>,
        sg_reconciler: Arc<dyn SecurityGroupReconciler>,
        bindings: Arc<dyn BindingStore>,
    ) -> Self {
        let endpoint_sg_resolver = EndpointSgResolver::new(
            sg_manager.clone(),
            config.cluster_name.clone(),
            config.service_target_eni_sg_tags.clone(),
        );
        Self {
            registry,
            sg_manager,
            sg_reconciler,
            bindings,
            endpoint_sg_resolver,
            sg_locks: SgLocks::default(),
            cluster_name: config.cluster_name.clone(),
            vpc_id: config.vpc_id.clone(),
            restricted_sg_rules: !config.disable_restricted_sg_rules,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PermissionRegistry> {
        &self.registry
    }

    /// Permissions requested by one binding's policy. Does not touch the
    /// registry.
    #[allow(clippy::unused_self)]
    pub fn compute_ingress_permissions_for_tgb_networking(
        &self,
        networking: &TargetGroupBindingNetworking,
        pods: &[PodInfo],
    ) -> NetworkingResult<Vec<IpPermissionInfo>> {
        compute_permissions(networking, pods)
    }

    pub async fn resolve_endpoint_sg_for_eni(&self, eni: &EniInfo) -> NetworkingResult<String> {
        self.endpoint_sg_resolver.resolve(eni).await
    }

    /// Records the permissions of a binding targeting pods and reconciles
    /// the endpoint security groups of those pods.
    #[tracing::instrument(skip_all, fields(binding = %BindingKey::from_binding(tgb)))]
    pub async fn reconcile_for_pod_endpoints(
        &self,
        tgb: &TargetGroupBinding,
        endpoints: &[PodEndpoint],
    ) -> NetworkingResult<()> {
        let permissions_per_sg = match &tgb.spec.networking {
            None => PermissionsPerSg::new(),
            Some(networking) => {
                let pods = endpoints
                    .iter()
                    .map(|endpoint| endpoint.pod.clone())
                    .collect::<Vec<_>>();
                let permissions = compute_permissions(networking, &pods)?;
                self.permissions_per_endpoint_sg(
                    permissions,
                    endpoints.iter().map(|endpoint| &endpoint.eni),
                )
                .await?
            }
        };
        self.update_binding(BindingKey::from_binding(tgb), permissions_per_sg)
            .await
    }

    /// Same as `reconcile_for_pod_endpoints` for bindings targeting node
    /// ports. Named ports cannot be resolved without pods.
    #[tracing::instrument(skip_all, fields(binding = %BindingKey::from_binding(tgb)))]
    pub async fn reconcile_for_node_port_endpoints(
        &self,
        tgb: &TargetGroupBinding,
        enis: &[EniInfo],
    ) -> NetworkingResult<()> {
        let permissions_per_sg = match &tgb.spec.networking {
            None => PermissionsPerSg::new(),
            Some(networking) => {
                let permissions = compute_permissions(networking, &[])?;
                self.permissions_per_endpoint_sg(permissions, enis.iter())
                    .await?
            }
        };
        self.update_binding(BindingKey::from_binding(tgb), permissions_per_sg)
            .await
    }

    /// Revokes rules left behind by bindings that no longer exist.
    ///
    /// Skipped until every live binding with a network policy has been
    /// computed, as the registry cannot tell which rules are still wanted
    /// before that. Safe to re-run.
    #[tracing::instrument(skip_all)]
    pub async fn attempt_garbage_collection(&self) -> NetworkingResult<()> {
        let live = self.bindings.list_bindings().await?;
        if !self.computed_for_all(&live) {
            tracing::debug!("Not every binding has been computed yet. Skipping garbage collection");
            return Ok(());
        }
        let live_keys = live
            .iter()
            .map(BindingKey::from_binding)
            .collect::<HashSet<_>>();
        let view = self.view(true);

        let eviction = Eviction::begin(&self.registry, &live_keys, view);
        if !eviction.keys.is_empty() {
            tracing::info!("Collecting {} deleted binding(s)", eviction.keys.len());
        }

        let filter = SecurityGroupFilter {
            vpc_id: Some(self.vpc_id.clone()),
            tag_keys: vec![consts::cluster_tag_key(&self.cluster_name)],
        };
        let cluster_sgs = self.sg_manager.fetch_sg_infos_by_request(&filter).await?;

        let desired = self.registry.view(view);
        let mut sg_ids = eviction.changed.clone();
        sg_ids.extend(
            cluster_sgs
                .into_keys()
                .filter(|sg_id| desired.get(sg_id).map_or(true, Vec::is_empty)),
        );

        let opts = ReconcileOptions::default().with_permission_selector(tgb_networking_labels());
        let result = self.reconcile_security_groups(sg_ids, view, &opts).await;
        if result.is_ok() {
            eviction.commit();
            self.sg_locks.prune();
        }
        result
    }

    async fn permissions_per_endpoint_sg<'a>(
        &self,
        permissions: Vec<IpPermissionInfo>,
        enis: impl Iterator<Item = &'a EniInfo>,
    ) -> NetworkingResult<PermissionsPerSg> {
        let mut seen = HashSet::new();
        let unique_enis = enis
            .filter(|eni| seen.insert(eni.network_interface_id.as_str()))
            .collect::<Vec<_>>();
        let sg_ids = try_join_all(
            unique_enis
                .into_iter()
                .map(|eni| self.endpoint_sg_resolver.resolve(eni)),
        )
        .await?;
        Ok(sg_ids
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|sg_id| (sg_id, permissions.clone()))
            .collect())
    }

    async fn update_binding(
        &self,
        key: BindingKey,
        permissions_per_sg: PermissionsPerSg,
    ) -> NetworkingResult<()> {
        let affected = self.registry.replace(key, permissions_per_sg);
        let live = self.bindings.list_bindings().await?;
        let computed_for_all = self.computed_for_all(&live);
        let opts = ReconcileOptions::default()
            .with_permission_selector(tgb_networking_labels())
            .with_authorize_only(!computed_for_all);
        self.reconcile_security_groups(affected, self.view(computed_for_all), &opts)
            .await
    }

    /// Whether every live binding declaring a network policy has an entry.
    fn computed_for_all(&self, live: &[TargetGroupBinding]) -> bool {
        live.iter()
            .filter(|tgb| tgb.spec.networking.is_some())
            .all(|tgb| self.registry.contains(&BindingKey::from_binding(tgb)))
    }

    const fn view(&self, computed_for_all: bool) -> View {
        if computed_for_all && self.restricted_sg_rules {
            View::Restricted
        } else {
            View::Unrestricted
        }
    }

    /// Reconciles each group independently. Every group is attempted even
    /// when some fail.
    async fn reconcile_security_groups(
        &self,
        sg_ids: BTreeSet<String>,
        view: View,
        opts: &ReconcileOptions,
    ) -> NetworkingResult<()> {
        let results = join_all(
            sg_ids
                .iter()
                .map(|sg_id| self.reconcile_security_group(sg_id, view, opts)),
        )
        .await;
        let failures = sg_ids
            .iter()
            .zip(results)
            .filter_map(|(sg_id, result)| {
                result
                    .map_err(|err| {
                        tracing::error!("Failed to reconcile security group {}: {}", sg_id, err);
                        err
                    })
                    .err()
            })
            .collect::<Vec<_>>();
        NetworkingError::from_failures(failures)
    }

    /// The desired state is read after taking the group's lock, so it is
    /// never older than what a previous holder applied.
    async fn reconcile_security_group(
        &self,
        sg_id: &str,
        view: View,
        opts: &ReconcileOptions,
    ) -> NetworkingResult<()> {
        let lock = self.sg_locks.get(sg_id);
        let _guard = lock.lock().await;
        let desired = self.registry.desired_for(sg_id, view);
        self.sg_reconciler
            .reconcile_ingress(sg_id, &desired, opts)
            .await
    }
}

/// One async mutex per security group.
#[derive(Default)]
struct SgLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SgLocks {
    fn get(&self, sg_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(sg_id.to_string())
            .or_default()
            .clone()
    }

    /// Drops the locks nobody holds or waits on.
    fn prune(&self) {
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Stale entries hidden from the views for the duration of a sweep. They
/// come back unless the sweep commits, including when it is cancelled.
struct Eviction<'a> {
    registry: &'a PermissionRegistry,
    keys: Vec<BindingKey>,
    changed: BTreeSet<String>,
    committed: bool,
}

impl<'a> Eviction<'a> {
    fn begin(registry: &'a PermissionRegistry, live: &HashSet<BindingKey>, view: View) -> Self {
        let (keys, changed) = registry.begin_eviction(live, view);
        Self {
            registry,
            keys,
            changed,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Eviction<'_> {
    fn drop(&mut self) {
        self.registry.finish_eviction(&self.keys, self.committed);
    }
}
