//! In-memory collaborators for tests.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use parking_lot::Mutex;

use super::{
    permission::IpPermissionInfo,
    sg_manager::{EniInfo, SecurityGroupFilter, SecurityGroupInfo, SecurityGroupManager},
    sg_reconciler::{ReconcileOptions, SecurityGroupReconciler},
    PodInfo,
};
use crate::{
    controller::EniInfoProvider,
    error::{NetworkingError, NetworkingResult},
    store::{BindingStore, PodInfoRepo},
    tgb::{
        NetworkingIngressRule, NetworkingPeer, NetworkingPort, SecurityGroupRef, ServiceReference,
        TargetGroupBinding, TargetGroupBindingNetworking, TargetGroupBindingSpec, TargetType,
    },
};

/// Routes logs of the calling test to the test output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Binding named `ns/name` with the given policy.
pub fn binding(
    namespace: &str,
    name: &str,
    networking: Option<TargetGroupBindingNetworking>,
) -> TargetGroupBinding {
    let mut tgb = TargetGroupBinding::new(
        name,
        TargetGroupBindingSpec {
            target_group_arn: format!("arn:aws:elasticloadbalancing:tg/{name}"),
            target_type: Some(TargetType::Instance),
            service_ref: ServiceReference {
                name: "svc".to_string(),
                port: IntOrString::Int(80),
            },
            networking,
        },
    );
    tgb.metadata.namespace = Some(namespace.to_string());
    tgb
}

/// Policy opening `port` to the security group `peer_sg`.
pub fn networking_on(peer_sg: &str, port: i32) -> TargetGroupBindingNetworking {
    TargetGroupBindingNetworking {
        ingress: vec![NetworkingIngressRule {
            from: vec![NetworkingPeer {
                security_group: Some(SecurityGroupRef {
                    group_id: peer_sg.to_string(),
                }),
                ..Default::default()
            }],
            ports: vec![NetworkingPort {
                protocol: None,
                port: Some(IntOrString::Int(port)),
            }],
        }],
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SgCall {
    FetchById(Vec<String>),
    FetchByRequest(SecurityGroupFilter),
    Authorize(String, Vec<IpPermissionInfo>),
    Revoke(String, Vec<IpPermissionInfo>),
}

/// Security groups kept in memory. Mutations change the stored ingress the
/// way the cloud would, and observed permissions come back with labels
/// derived from their description.
#[derive(Default)]
pub struct FakeSecurityGroupManager {
    groups: Mutex<HashMap<String, SecurityGroupInfo>>,
    calls: Mutex<Vec<SgCall>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeSecurityGroupManager {
    pub fn with_groups(groups: impl IntoIterator<Item = SecurityGroupInfo>) -> Self {
        let fake = Self::default();
        fake.groups.lock().extend(
            groups
                .into_iter()
                .map(|group| (group.security_group_id.clone(), group)),
        );
        fake
    }

    pub fn calls(&self) -> Vec<SgCall> {
        self.calls.lock().clone()
    }

    pub fn request_filters(&self) -> Vec<SecurityGroupFilter> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SgCall::FetchByRequest(filter) => Some(filter),
                _ => None,
            })
            .collect()
    }

    pub fn group(&self, sg_id: &str) -> Option<SecurityGroupInfo> {
        self.groups.lock().get(sg_id).cloned()
    }

    /// Authorize and revoke calls on `sg_id` fail from now on.
    pub fn fail_mutations_on(&self, sg_id: &str) {
        self.failing.lock().insert(sg_id.to_string());
    }

    fn check_mutation(&self, sg_id: &str) -> NetworkingResult<()> {
        if self.failing.lock().contains(sg_id) {
            return Err(NetworkingError::CloudApi {
                sg_id: sg_id.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityGroupManager for FakeSecurityGroupManager {
    async fn fetch_sg_infos_by_id(
        &self,
        sg_ids: &[String],
    ) -> NetworkingResult<HashMap<String, SecurityGroupInfo>> {
        self.calls.lock().push(SgCall::FetchById(sg_ids.to_vec()));
        let groups = self.groups.lock();
        Ok(sg_ids
            .iter()
            .filter_map(|id| groups.get(id).map(|group| (id.clone(), group.clone())))
            .collect())
    }

    async fn fetch_sg_infos_by_request(
        &self,
        filter: &SecurityGroupFilter,
    ) -> NetworkingResult<HashMap<String, SecurityGroupInfo>> {
        self.calls.lock().push(SgCall::FetchByRequest(filter.clone()));
        Ok(self
            .groups
            .lock()
            .values()
            .filter(|group| filter.tag_keys.iter().all(|key| group.tags.contains_key(key)))
            .map(|group| (group.security_group_id.clone(), group.clone()))
            .collect())
    }

    async fn authorize_ingress(
        &self,
        sg_id: &str,
        permissions: &[IpPermissionInfo],
    ) -> NetworkingResult<()> {
        self.calls
            .lock()
            .push(SgCall::Authorize(sg_id.to_string(), permissions.to_vec()));
        self.check_mutation(sg_id)?;
        let mut groups = self.groups.lock();
        let group = groups.entry(sg_id.to_string()).or_default();
        group.security_group_id = sg_id.to_string();
        group.ingress.extend(
            permissions
                .iter()
                .map(|info| IpPermissionInfo::from_observed(info.permission.clone())),
        );
        Ok(())
    }

    async fn revoke_ingress(
        &self,
        sg_id: &str,
        permissions: &[IpPermissionInfo],
    ) -> NetworkingResult<()> {
        self.calls
            .lock()
            .push(SgCall::Revoke(sg_id.to_string(), permissions.to_vec()));
        self.check_mutation(sg_id)?;
        if let Some(group) = self.groups.lock().get_mut(sg_id) {
            group.ingress.retain(|observed| {
                !permissions
                    .iter()
                    .any(|revoked| revoked.permission == observed.permission)
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReconcileCall {
    pub sg_id: String,
    pub desired: Vec<IpPermissionInfo>,
    pub opts: ReconcileOptions,
}

/// Records every reconcile request without touching any group.
#[derive(Default)]
pub struct RecordingReconciler {
    calls: Mutex<Vec<ReconcileCall>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingReconciler {
    pub fn calls(&self) -> Vec<ReconcileCall> {
        self.calls.lock().clone()
    }

    pub fn sg_ids(&self) -> BTreeSet<String> {
        self.calls().into_iter().map(|call| call.sg_id).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn fail_on(&self, sg_id: &str) {
        self.failing.lock().insert(sg_id.to_string());
    }
}

#[async_trait]
impl SecurityGroupReconciler for RecordingReconciler {
    async fn reconcile_ingress(
        &self,
        sg_id: &str,
        desired: &[IpPermissionInfo],
        opts: &ReconcileOptions,
    ) -> NetworkingResult<()> {
        self.calls.lock().push(ReconcileCall {
            sg_id: sg_id.to_string(),
            desired: desired.to_vec(),
            opts: opts.clone(),
        });
        if self.failing.lock().contains(sg_id) {
            return Err(NetworkingError::CloudApi {
                sg_id: sg_id.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeBindingStore {
    bindings: Mutex<Vec<TargetGroupBinding>>,
}

impl FakeBindingStore {
    pub fn new(bindings: Vec<TargetGroupBinding>) -> Self {
        Self {
            bindings: Mutex::new(bindings),
        }
    }

    pub fn set(&self, bindings: Vec<TargetGroupBinding>) {
        *self.bindings.lock() = bindings;
    }
}

#[async_trait]
impl BindingStore for FakeBindingStore {
    async fn list_bindings(&self) -> NetworkingResult<Vec<TargetGroupBinding>> {
        Ok(self.bindings.lock().clone())
    }
}

/// Returns the same pods for every binding.
#[derive(Default)]
pub struct FakePodInfoRepo {
    pub pods: Vec<PodInfo>,
}

#[async_trait]
impl PodInfoRepo for FakePodInfoRepo {
    async fn list_pods(&self, _tgb: &TargetGroupBinding) -> NetworkingResult<Vec<PodInfo>> {
        Ok(self.pods.clone())
    }
}

/// ENIs keyed by pod name and by node name.
#[derive(Default)]
pub struct FakeEniInfoProvider {
    pub pod_enis: HashMap<String, EniInfo>,
    pub node_enis: HashMap<String, EniInfo>,
}

#[async_trait]
impl EniInfoProvider for FakeEniInfoProvider {
    async fn resolve_pod_enis(&self, pods: &[PodInfo]) -> NetworkingResult<HashMap<String, EniInfo>> {
        Ok(pods
            .iter()
            .filter_map(|pod| {
                self.pod_enis
                    .get(&pod.name)
                    .map(|eni| (pod.name.clone(), eni.clone()))
            })
            .collect())
    }

    async fn resolve_node_enis(&self, node_names: &[String]) -> NetworkingResult<Vec<EniInfo>> {
        Ok(node_names
            .iter()
            .filter_map(|node| self.node_enis.get(node).cloned())
            .collect())
    }
}
