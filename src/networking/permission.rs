use std::collections::BTreeMap;

use crate::consts;

/// Source of an ingress rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Peer {
    SecurityGroup(String),
    Ipv4Cidr(String),
    Ipv6Cidr(String),
}

impl Peer {
    /// Group ID or CIDR, whichever identifies the peer.
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::SecurityGroup(id) | Self::Ipv4Cidr(id) | Self::Ipv6Cidr(id) => id,
        }
    }
}

/// Inclusive port range. `0..=65535` stands for all ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    pub from_port: i32,
    pub to_port: i32,
}

impl PortRange {
    #[must_use]
    pub const fn new(from_port: i32, to_port: i32) -> Self {
        Self { from_port, to_port }
    }

    #[must_use]
    pub const fn single(port: i32) -> Self {
        Self::new(port, port)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self::new(consts::ALL_PORTS_FROM, consts::ALL_PORTS_TO)
    }
}

/// One ingress rule as the cloud API sees it. Equality is structural and
/// drives the reconciliation diff.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IpPermission {
    pub protocol: String,
    pub port_range: Option<PortRange>,
    pub peer: Peer,
    pub description: Option<String>,
}

/// A permission together with its provenance labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpPermissionInfo {
    pub permission: IpPermission,
    pub labels: BTreeMap<String, String>,
}

impl IpPermissionInfo {
    #[must_use]
    pub const fn new(permission: IpPermission, labels: BTreeMap<String, String>) -> Self {
        Self { permission, labels }
    }

    /// Wraps a permission observed on the cloud side, deriving its labels
    /// from the rule description.
    #[must_use]
    pub fn from_observed(permission: IpPermission) -> Self {
        let labels = permission
            .description
            .as_deref()
            .map(labels_from_description)
            .unwrap_or_default();
        Self { permission, labels }
    }

    /// Permission owned by binding networking, in the shape the manager
    /// authorizes it.
    #[must_use]
    pub fn tgb_networking(protocol: &str, port_range: PortRange, peer: Peer) -> Self {
        Self {
            permission: IpPermission {
                protocol: protocol.to_string(),
                port_range: Some(port_range),
                peer,
                description: Some(consts::tgb_networking_permission_description()),
            },
            labels: tgb_networking_labels(),
        }
    }

    /// Whether every selector pair is present in the labels.
    #[must_use]
    pub fn matches_selector(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(key, value)| self.labels.get(key) == Some(value))
    }
}

#[must_use]
pub fn tgb_networking_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(
        consts::TGB_NETWORKING_PERMISSION_LABEL_KEY.to_string(),
        consts::TGB_NETWORKING_PERMISSION_LABEL_VALUE.to_string(),
    )])
}

/// Parses `k=v[,k=v]` descriptions. Anything else yields no labels.
#[must_use]
pub fn labels_from_description(description: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    for pair in description.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            return BTreeMap::new();
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return BTreeMap::new();
        }
        labels.insert(key.to_string(), value.trim().to_string());
    }
    labels
}
