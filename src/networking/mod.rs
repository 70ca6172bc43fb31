//! Ingress permission engine for binding network policies.
//!
//! Bindings declare which peers may reach their targets. Their permissions
//! are computed, recorded per binding in the registry, aggregated per
//! endpoint security group and applied to the cloud by the reconciler.

pub mod aggregate;
pub mod compute;
pub mod endpoint_sg;
pub mod manager;
pub mod permission;
pub mod ports;
pub mod registry;
pub mod sg_manager;
pub mod sg_reconciler;

#[cfg(test)]
pub(crate) mod testutil;

pub use aggregate::{restricted_permissions_per_sg, unrestricted_permissions_per_sg, PermissionsPerSg};
pub use compute::{compute_permissions, compute_permissions_for_peer_port};
pub use endpoint_sg::EndpointSgResolver;
pub use manager::{NetworkingManager, PodEndpoint};
pub use permission::{IpPermission, IpPermissionInfo, Peer, PortRange};
pub use ports::{resolve_ports, PodInfo};
pub use registry::{PermissionRegistry, View};
pub use sg_manager::{EniInfo, SecurityGroupFilter, SecurityGroupInfo, SecurityGroupManager};
pub use sg_reconciler::{DefaultSecurityGroupReconciler, ReconcileOptions, SecurityGroupReconciler};
