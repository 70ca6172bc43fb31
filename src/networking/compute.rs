use std::str::FromStr;

use ipnet::IpNet;

use super::{
    permission::{IpPermissionInfo, Peer, PortRange},
    ports::{resolve_ports, PodInfo},
};
use crate::{
    error::{NetworkingError, NetworkingResult},
    tgb::{NetworkingPeer, NetworkingPort, TargetGroupBindingNetworking},
};

/// Computes the ingress permissions a binding's network policy asks for.
///
/// Output order follows rule order, then peer order, then port order, then
/// resolved numeric port order. Any failure discards the whole result.
pub fn compute_permissions(
    networking: &TargetGroupBindingNetworking,
    pods: &[PodInfo],
) -> NetworkingResult<Vec<IpPermissionInfo>> {
    let mut permissions = Vec::new();
    for rule in &networking.ingress {
        for peer in &rule.from {
            for port in &rule.ports {
                permissions.extend(compute_permissions_for_peer_port(peer, port, pods)?);
            }
        }
    }
    Ok(permissions)
}

/// Permissions for a single (peer, port) pair of a rule.
pub fn compute_permissions_for_peer_port(
    peer: &NetworkingPeer,
    port: &NetworkingPort,
    pods: &[PodInfo],
) -> NetworkingResult<Vec<IpPermissionInfo>> {
    let protocol = port.protocol.unwrap_or_default().as_cloud_str();
    let peer = resolve_peer(peer)?;
    let Some(port) = &port.port else {
        return Ok(vec![IpPermissionInfo::tgb_networking(
            protocol,
            PortRange::all(),
            peer,
        )]);
    };
    Ok(resolve_ports(port, pods)?
        .into_iter()
        .map(|number| {
            IpPermissionInfo::tgb_networking(protocol, PortRange::single(number), peer.clone())
        })
        .collect())
}

fn resolve_peer(peer: &NetworkingPeer) -> NetworkingResult<Peer> {
    match (&peer.security_group, &peer.ip_block) {
        (Some(sg), None) => Ok(Peer::SecurityGroup(sg.group_id.clone())),
        (None, Some(block)) => match IpNet::from_str(&block.cidr) {
            Ok(IpNet::V4(_)) => Ok(Peer::Ipv4Cidr(block.cidr.clone())),
            Ok(IpNet::V6(_)) => Ok(Peer::Ipv6Cidr(block.cidr.clone())),
            Err(err) => Err(NetworkingError::InvalidPolicy(format!(
                "invalid CIDR {}: {err}",
                block.cidr
            ))),
        },
        _ => Err(NetworkingError::InvalidPolicy(
            "networking peer must set exactly one of ipBlock or securityGroup".to_string(),
        )),
    }
}
