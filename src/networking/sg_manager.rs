use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use super::permission::IpPermissionInfo;
use crate::error::NetworkingResult;

/// Snapshot of a cloud security group. Only valid for one reconcile pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroupInfo {
    pub security_group_id: String,
    pub ingress: Vec<IpPermissionInfo>,
    pub tags: BTreeMap<String, String>,
}

/// A network interface and the security groups attached to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EniInfo {
    pub network_interface_id: String,
    pub security_groups: Vec<String>,
}

/// Server side filter for listing security groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroupFilter {
    pub vpc_id: Option<String>,
    /// Tag keys that must be present, whatever their value.
    pub tag_keys: Vec<String>,
}

/// Cloud security group API.
///
/// Implementations convert provider failures into
/// `NetworkingError::CloudApi` for the group involved. Observed ingress
/// permissions are returned via `IpPermissionInfo::from_observed`.
#[async_trait]
pub trait SecurityGroupManager: Send + Sync {
    async fn fetch_sg_infos_by_id(
        &self,
        sg_ids: &[String],
    ) -> NetworkingResult<HashMap<String, SecurityGroupInfo>>;

    async fn fetch_sg_infos_by_request(
        &self,
        filter: &SecurityGroupFilter,
    ) -> NetworkingResult<HashMap<String, SecurityGroupInfo>>;

    async fn authorize_ingress(
        &self,
        sg_id: &str,
        permissions: &[IpPermissionInfo],
    ) -> NetworkingResult<()>;

    async fn revoke_ingress(
        &self,
        sg_id: &str,
        permissions: &[IpPermissionInfo],
    ) -> NetworkingResult<()>;
}
