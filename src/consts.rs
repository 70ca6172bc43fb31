// Binding resource
pub const TGB_GROUP: &str = "elbv2.k8s.aws";
pub const TGB_VERSION: &str = "v1beta1";

// Provenance of permissions managed by binding networking.
pub const TGB_NETWORKING_PERMISSION_LABEL_KEY: &str = "elbv2.k8s.aws/targetGroupBinding";
pub const TGB_NETWORKING_PERMISSION_LABEL_VALUE: &str = "shared";

// Cluster ownership tags on security groups.
pub const CLUSTER_TAG_KEY_PREFIX: &str = "kubernetes.io/cluster/";
pub const CLUSTER_TAG_OWNED_VALUE: &str = "owned";

pub const ALL_PORTS_FROM: i32 = 0;
pub const ALL_PORTS_TO: i32 = 65535;

pub const PROTOCOL_TCP: &str = "tcp";
pub const PROTOCOL_UDP: &str = "udp";

pub const DEFAULT_GC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_GC_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REQUEUE_SECS: u64 = 30;

/// Tag key marking a security group as belonging to `cluster_name`.
#[must_use]
pub fn cluster_tag_key(cluster_name: &str) -> String {
    format!("{CLUSTER_TAG_KEY_PREFIX}{cluster_name}")
}

/// Description attached to every rule the networking manager authorizes.
#[must_use]
pub fn tgb_networking_permission_description() -> String {
    format!("{TGB_NETWORKING_PERMISSION_LABEL_KEY}={TGB_NETWORKING_PERMISSION_LABEL_VALUE}")
}
