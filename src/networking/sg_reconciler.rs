use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;

use super::{
    permission::{IpPermission, IpPermissionInfo},
    sg_manager::SecurityGroupManager,
};
use crate::error::{NetworkingError, NetworkingResult};

/// Options of a single ingress reconciliation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Only revoke observed permissions whose labels contain every pair.
    pub permission_selector: BTreeMap<String, String>,
    /// Never revoke.
    pub authorize_only: bool,
}

impl ReconcileOptions {
    #[must_use]
    pub fn with_permission_selector(mut self, selector: BTreeMap<String, String>) -> Self {
        self.permission_selector = selector;
        self
    }

    #[must_use]
    pub const fn with_authorize_only(mut self, authorize_only: bool) -> Self {
        self.authorize_only = authorize_only;
        self
    }
}

#[async_trait]
pub trait SecurityGroupReconciler: Send + Sync {
    /// Converges the ingress rules of `sg_id` to `desired`.
    async fn reconcile_ingress(
        &self,
        sg_id: &str,
        desired: &[IpPermissionInfo],
        opts: &ReconcileOptions,
    ) -> NetworkingResult<()>;
}

/// Diffs desired against observed rules and issues one batched revoke and one
/// batched authorize call.
pub struct DefaultSecurityGroupReconciler {
    sg_manager: Arc<dyn SecurityGroupManager>,
}

impl DefaultSecurityGroupReconciler {
    #[must_use]
    pub fn new(sg_manager: Arc<dyn SecurityGroupManager>) -> Self {
        Self { sg_manager }
    }
}

#[async_trait]
impl SecurityGroupReconciler for DefaultSecurityGroupReconciler {
    #[tracing::instrument(skip(self, desired, opts), fields(desired = desired.len()))]
    async fn reconcile_ingress(
        &self,
        sg_id: &str,
        desired: &[IpPermissionInfo],
        opts: &ReconcileOptions,
    ) -> NetworkingResult<()> {
        let mut sg_infos = self
            .sg_manager
            .fetch_sg_infos_by_id(&[sg_id.to_string()])
            .await?;
        let Some(sg_info) = sg_infos.remove(sg_id) else {
            return Err(NetworkingError::CloudApi {
                sg_id: sg_id.to_string(),
                message: "security group not found".to_string(),
            });
        };

        let to_revoke = if opts.authorize_only {
            Vec::new()
        } else {
            diff_permissions(&sg_info.ingress, desired)
                .into_iter()
                .filter(|info| info.matches_selector(&opts.permission_selector))
                .collect()
        };
        let to_grant = diff_permissions(desired, &sg_info.ingress);

        if !to_revoke.is_empty() {
            tracing::info!("Revoking {} ingress permission(s)", to_revoke.len());
            self.sg_manager.revoke_ingress(sg_id, &to_revoke).await?;
        }
        if !to_grant.is_empty() {
            tracing::info!("Authorizing {} ingress permission(s)", to_grant.len());
            self.sg_manager.authorize_ingress(sg_id, &to_grant).await?;
        }
        Ok(())
    }
}

/// Permissions in `left` absent from `right`, compared structurally and
/// without duplicates.
fn diff_permissions(left: &[IpPermissionInfo], right: &[IpPermissionInfo]) -> Vec<IpPermissionInfo> {
    let right = right
        .iter()
        .map(|info| &info.permission)
        .collect::<HashSet<&IpPermission>>();
    let mut seen = HashSet::new();
    let mut diff = Vec::new();
    for info in left {
        if !right.contains(&info.permission) && seen.insert(&info.permission) {
            diff.push(info.clone());
        }
    }
    diff
}
