use std::time::Duration;

use clap::Parser;

use crate::tag_filter::TagFilter;

#[derive(Debug, Clone, Parser)]
pub struct NetworkingConfig {
    /// Name of the cluster. Security groups owned by the cluster carry
    /// the `kubernetes.io/cluster/<name>=owned` tag.
    #[arg(long, env = "TGB_NETWORKING_CLUSTER_NAME")]
    pub cluster_name: String,

    /// VPC the cluster runs in. Garbage collection only looks at
    /// security groups of this VPC.
    #[arg(long, env = "TGB_NETWORKING_VPC_ID")]
    pub vpc_id: String,

    /// If enabled, desired rules are applied as the raw union of every
    /// binding's permissions instead of coalesced port ranges.
    #[arg(long, env = "TGB_NETWORKING_DISABLE_RESTRICTED_SG_RULES", default_value = "false")]
    pub disable_restricted_sg_rules: bool,

    /// Extra tags used to pick the endpoint security group of an ENI
    /// when it has several. Format: `key=value,key2=,key3`.
    /// An empty value only requires the tag to be present.
    #[arg(
        long,
        env = "TGB_NETWORKING_SERVICE_TARGET_ENI_SG_TAGS",
        default_value = ""
    )]
    pub service_target_eni_sg_tags: TagFilter,

    /// How often garbage collection of deleted bindings runs.
    #[arg(long, env = "TGB_NETWORKING_GC_INTERVAL_SECS", default_value = "300")]
    pub gc_interval_secs: u64,

    /// Upper bound for a single garbage collection sweep.
    #[arg(long, env = "TGB_NETWORKING_GC_TIMEOUT_SECS", default_value = "120")]
    pub gc_timeout_secs: u64,

    /// Requeue interval of a successfully reconciled binding.
    #[arg(long, env = "TGB_NETWORKING_REQUEUE_SECS", default_value = "30")]
    pub requeue_secs: u64,
}

impl NetworkingConfig {
    #[must_use]
    pub const fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    #[must_use]
    pub const fn gc_timeout(&self) -> Duration {
        Duration::from_secs(self.gc_timeout_secs)
    }

    #[must_use]
    pub const fn requeue(&self) -> Duration {
        Duration::from_secs(self.requeue_secs)
    }
}
