use thiserror::Error;

pub type NetworkingResult<T> = Result<T, NetworkingError>;

#[derive(Debug, Error)]
pub enum NetworkingError {
    #[error("{0}")]
    InvalidPolicy(String),
    #[error(
        "expected exactly one security group tagged with {selector} for eni {eni_id}, got: {found:?} (clusterName: {cluster_name})"
    )]
    AmbiguousEndpointSg {
        eni_id: String,
        cluster_name: String,
        selector: String,
        found: Vec<String>,
    },
    #[error("cloud API error on security group {sg_id}: {message}")]
    CloudApi { sg_id: String, message: String },
    #[error("{} security group(s) failed to reconcile: {}", .0.len(), join_errors(.0))]
    ReconcileFailures(Vec<NetworkingError>),
    #[error("Cannot parse tag filter: {0}")]
    InvalidTagFilter(String),
    #[error("Service referenced by the binding has no selector")]
    ServiceWithoutSelector,
    #[error("Binding has no namespace")]
    MissingNamespace,
    #[error("Operation timed out")]
    Timeout,
    #[error("Binding cache stopped before its initial sync")]
    StoreNotReady,
    #[error("Kube error: {0}")]
    KubeError(#[from] kube::Error),
}

impl NetworkingError {
    /// Collapses a list of isolated per-SG failures into one error.
    pub fn from_failures(mut failures: Vec<Self>) -> NetworkingResult<()> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Self::ReconcileFailures(failures)),
        }
    }
}

fn join_errors(errors: &[NetworkingError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<tokio::time::error::Elapsed> for NetworkingError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::Timeout
    }
}
