use k8s_openapi::{api::core::v1::ContainerPort, apimachinery::pkg::util::intstr::IntOrString};

use crate::error::{NetworkingError, NetworkingResult};

/// A pod backing a binding, reduced to what port resolution needs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodInfo {
    pub namespace: String,
    pub name: String,
    pub node_name: Option<String>,
    pub pod_ip: Option<String>,
    pub container_ports: Vec<ContainerPort>,
}

/// Resolves a numeric or named port against the pods.
///
/// Named ports may map to different numbers on different pods; every
/// distinct number is returned, in first-seen order.
pub fn resolve_ports(port: &IntOrString, pods: &[PodInfo]) -> NetworkingResult<Vec<i32>> {
    let name = match port {
        IntOrString::Int(number) => return Ok(vec![*number]),
        IntOrString::String(name) => name,
    };
    if pods.is_empty() {
        return Err(NetworkingError::InvalidPolicy(
            "named ports can only be used with pod endpoints".to_string(),
        ));
    }
    let mut ports = Vec::new();
    for pod in pods {
        for container_port in &pod.container_ports {
            if container_port.name.as_deref() == Some(name.as_str())
                && !ports.contains(&container_port.container_port)
            {
                ports.push(container_port.container_port);
            }
        }
    }
    if ports.is_empty() {
        tracing::debug!("Named port {} matched no container port", name);
    }
    Ok(ports)
}

#[cfg(test)]
pub(crate) fn pod_with_port(name: &str, port_name: &str, port: i32) -> PodInfo {
    PodInfo {
        namespace: "ns-1".to_string(),
        name: name.to_string(),
        container_ports: vec![ContainerPort {
            name: Some(port_name.to_string()),
            container_port: port,
            ..Default::default()
        }],
        ..Default::default()
    }
}
