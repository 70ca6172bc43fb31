//! Cluster-wide views over the per-binding permissions of each security group.

use std::collections::{BTreeMap, HashMap};

use super::permission::{IpPermission, IpPermissionInfo, Peer, PortRange};

/// Permissions of one binding keyed by security group ID.
pub type PermissionsPerSg = HashMap<String, Vec<IpPermissionInfo>>;

/// Raw union: every binding's permissions for a security group, concatenated.
/// Duplicates across bindings are kept.
pub fn unrestricted_permissions_per_sg<'a>(
    bindings: impl IntoIterator<Item = &'a PermissionsPerSg>,
) -> PermissionsPerSg {
    let mut result = PermissionsPerSg::new();
    for permissions_per_sg in bindings {
        for (sg_id, permissions) in permissions_per_sg {
            result
                .entry(sg_id.clone())
                .or_default()
                .extend(permissions.iter().cloned());
        }
    }
    result
}

/// Coalesced view: per (protocol, peer), overlapping or adjacent port ranges
/// are merged into the fewest ranges covering the same ports.
///
/// Merged entries carry no labels. The description is the smallest one among
/// the merged sources so the output does not depend on binding order.
pub fn restricted_permissions_per_sg<'a>(
    bindings: impl IntoIterator<Item = &'a PermissionsPerSg>,
) -> PermissionsPerSg {
    let mut grouped: HashMap<String, BTreeMap<(String, Peer), Vec<Source>>> = HashMap::new();
    for permissions_per_sg in bindings {
        for (sg_id, permissions) in permissions_per_sg {
            let groups = grouped.entry(sg_id.clone()).or_default();
            for info in permissions {
                let permission = &info.permission;
                groups
                    .entry((permission.protocol.clone(), permission.peer.clone()))
                    .or_default()
                    .push(Source {
                        range: permission.port_range.unwrap_or_else(PortRange::all),
                        description: permission.description.clone(),
                    });
            }
        }
    }

    grouped
        .into_iter()
        .map(|(sg_id, groups)| {
            let permissions = groups
                .into_iter()
                .flat_map(|((protocol, peer), sources)| {
                    merge_sources(sources)
                        .into_iter()
                        .map(move |(range, description)| {
                            IpPermissionInfo::new(
                                IpPermission {
                                    protocol: protocol.clone(),
                                    port_range: Some(range),
                                    peer: peer.clone(),
                                    description,
                                },
                                BTreeMap::new(),
                            )
                        })
                })
                .collect();
            (sg_id, permissions)
        })
        .collect()
}

struct Source {
    range: PortRange,
    description: Option<String>,
}

fn merge_sources(mut sources: Vec<Source>) -> Vec<(PortRange, Option<String>)> {
    sources.sort_by_key(|source| source.range);
    let mut merged: Vec<(PortRange, Option<String>)> = Vec::new();
    for source in sources {
        if let Some((current, description)) = merged.last_mut() {
            if source.range.from_port <= current.to_port.saturating_add(1) {
                current.to_port = current.to_port.max(source.range.to_port);
                *description = smallest_description(description.take(), source.description);
                continue;
            }
        }
        merged.push((source.range, source.description));
    }
    merged
}

fn smallest_description(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
