use std::sync::Arc;

use super::sg_manager::{EniInfo, SecurityGroupManager};
use crate::{
    consts,
    error::{NetworkingError, NetworkingResult},
    tag_filter::TagFilter,
};

/// Picks the security group that gates traffic to an ENI.
pub struct EndpointSgResolver {
    sg_manager: Arc<dyn SecurityGroupManager>,
    cluster_name: String,
    service_target_eni_sg_tags: TagFilter,
}

impl EndpointSgResolver {
    #[must_use]
    pub fn new(
        sg_manager: Arc<dyn SecurityGroupManager>,
        cluster_name: String,
        service_target_eni_sg_tags: TagFilter,
    ) -> Self {
        Self {
            sg_manager,
            cluster_name,
            service_target_eni_sg_tags,
        }
    }

    /// A lone attached group is returned as is. Otherwise exactly one group
    /// must be owned by the cluster and match the extra tag filter.
    #[tracing::instrument(skip(self, eni), fields(eni = %eni.network_interface_id))]
    pub async fn resolve(&self, eni: &EniInfo) -> NetworkingResult<String> {
        if let [sg_id] = eni.security_groups.as_slice() {
            return Ok(sg_id.clone());
        }

        let sg_infos = if eni.security_groups.is_empty() {
            Default::default()
        } else {
            self.sg_manager
                .fetch_sg_infos_by_id(&eni.security_groups)
                .await?
        };

        let cluster_tag = consts::cluster_tag_key(&self.cluster_name);
        let mut found = sg_infos
            .values()
            .filter(|info| {
                info.tags.get(&cluster_tag).map(String::as_str)
                    == Some(consts::CLUSTER_TAG_OWNED_VALUE)
                    && self.service_target_eni_sg_tags.matches(&info.tags)
            })
            .map(|info| info.security_group_id.clone())
            .collect::<Vec<_>>();
        found.sort();

        if found.len() == 1 {
            return Ok(found.remove(0));
        }

        let selector = if self.service_target_eni_sg_tags.is_empty() {
            cluster_tag
        } else {
            format!("{cluster_tag} and {}", self.service_target_eni_sg_tags)
        };
        Err(NetworkingError::AmbiguousEndpointSg {
            eni_id: eni.network_interface_id.clone(),
            cluster_name: self.cluster_name.clone(),
            selector,
            found,
        })
    }
}
