use std::fmt;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Binds a cloud target group to the pods behind a service, optionally
/// opening the endpoint security groups to the listed peers.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "elbv2.k8s.aws",
    version = "v1beta1",
    kind = "TargetGroupBinding",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct TargetGroupBindingSpec {
    #[serde(rename = "targetGroupARN")]
    pub target_group_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetType>,
    pub service_ref: ServiceReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub networking: Option<TargetGroupBindingNetworking>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Instance,
    Ip,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceReference {
    pub name: String,
    pub port: IntOrString,
}

/// Network policy of a binding.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct TargetGroupBindingNetworking {
    #[serde(default)]
    pub ingress: Vec<NetworkingIngressRule>,
}

/// Peers times ports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct NetworkingIngressRule {
    #[serde(default)]
    pub from: Vec<NetworkingPeer>,
    #[serde(default)]
    pub ports: Vec<NetworkingPort>,
}

/// Exactly one of `ip_block` or `security_group` must be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkingPeer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_block: Option<IpBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group: Option<SecurityGroupRef>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct IpBlock {
    pub cidr: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRef {
    #[serde(rename = "groupID")]
    pub group_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct NetworkingPort {
    /// Defaults to TCP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<NetworkingProtocol>,
    /// Numeric or named port. Absent means all ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<IntOrString>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum NetworkingProtocol {
    #[default]
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl NetworkingProtocol {
    /// Protocol name as the cloud API spells it.
    #[must_use]
    pub const fn as_cloud_str(self) -> &'static str {
        match self {
            Self::Tcp => crate::consts::PROTOCOL_TCP,
            Self::Udp => crate::consts::PROTOCOL_UDP,
        }
    }
}

/// Namespace and name of a binding. Key of the permission registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub namespace: String,
    pub name: String,
}

impl BindingKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn from_binding(tgb: &TargetGroupBinding) -> Self {
        Self::new(tgb.namespace().unwrap_or_default(), tgb.name_any())
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
