use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{api::ListParams, runtime::reflector::Store, Api, ResourceExt};

use crate::{
    error::{NetworkingError, NetworkingResult},
    networking::PodInfo,
    tgb::TargetGroupBinding,
};

/// Live bindings of the cluster.
#[async_trait]
pub trait BindingStore: Send + Sync {
    async fn list_bindings(&self) -> NetworkingResult<Vec<TargetGroupBinding>>;
}

/// Pods backing a binding.
#[async_trait]
pub trait PodInfoRepo: Send + Sync {
    async fn list_pods(&self, tgb: &TargetGroupBinding) -> NetworkingResult<Vec<PodInfo>>;
}

/// Bindings read from the controller's watch cache.
///
/// Listing waits for the initial sync: a partial cache would make bindings
/// not seen yet look deleted.
pub struct KubeBindingStore {
    store: Store<TargetGroupBinding>,
}

impl KubeBindingStore {
    #[must_use]
    pub const fn new(store: Store<TargetGroupBinding>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BindingStore for KubeBindingStore {
    async fn list_bindings(&self) -> NetworkingResult<Vec<TargetGroupBinding>> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|_| NetworkingError::StoreNotReady)?;
        Ok(self
            .store
            .state()
            .into_iter()
            .map(|tgb| tgb.as_ref().clone())
            .collect())
    }
}

/// Finds pods through the selector of the service a binding references.
pub struct KubePodInfoRepo {
    client: kube::Client,
}

impl KubePodInfoRepo {
    #[must_use]
    pub const fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodInfoRepo for KubePodInfoRepo {
    #[tracing::instrument(skip(self, tgb), fields(binding = tgb.name_any()))]
    async fn list_pods(&self, tgb: &TargetGroupBinding) -> NetworkingResult<Vec<PodInfo>> {
        let namespace = tgb.namespace().ok_or(NetworkingError::MissingNamespace)?;
        let svc_api = Api::<Service>::namespaced(self.client.clone(), &namespace);
        let svc = svc_api.get(&tgb.spec.service_ref.name).await?;

        let Some(pod_selector) = svc
            .spec
            .and_then(|spec| spec.selector)
            .filter(|selector| !selector.is_empty())
        else {
            return Err(NetworkingError::ServiceWithoutSelector);
        };
        let label_selector = pod_selector
            .iter()
            .map(|(key, val)| format!("{key}={val}"))
            .collect::<Vec<_>>()
            .join(",");

        let pod_api = Api::<Pod>::namespaced(self.client.clone(), &namespace);
        let pods = pod_api
            .list(&ListParams {
                label_selector: Some(label_selector),
                ..Default::default()
            })
            .await?;

        Ok(pods.iter().filter_map(pod_info_from_pod).collect())
    }
}

/// Terminating pods are left out.
#[must_use]
pub fn pod_info_from_pod(pod: &Pod) -> Option<PodInfo> {
    if pod.metadata.deletion_timestamp.is_some() {
        return None;
    }
    let spec = pod.spec.clone().unwrap_or_default();
    Some(PodInfo {
        namespace: pod.namespace().unwrap_or_default(),
        name: pod.name_any(),
        node_name: spec.node_name,
        pod_ip: pod.status.as_ref().and_then(|status| status.pod_ip.clone()),
        container_ports: spec
            .containers
            .into_iter()
            .flat_map(|container| container.ports.unwrap_or_default())
            .collect(),
    })
}
