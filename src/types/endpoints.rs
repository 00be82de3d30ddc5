// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired Endpoints state derived from a local service and the remote nodes.

use crate::error::{MirrorError, Result};
use crate::types::node::NodeExt;
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Node, Service,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One endpoint port per service port, in service order
pub fn endpoint_ports(service: &Service) -> Result<Vec<EndpointPort>> {
    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| MirrorError::NoPortsDefined(service_id(service)))?;

    Ok(ports
        .iter()
        .map(|port| EndpointPort {
            name: port.name.clone(),
            port: match port.target_port {
                Some(IntOrString::Int(target)) => target,
                _ => port.port,
            },
            protocol: port.protocol.clone(),
            ..Default::default()
        })
        .collect())
}

/// Internal IPs of all ready nodes; nodes without one are skipped
pub fn endpoint_addresses(nodes: &[Arc<Node>]) -> Vec<EndpointAddress> {
    nodes
        .iter()
        .filter(|node| node.is_ready())
        .filter_map(|node| node.internal_ip())
        .map(|ip| EndpointAddress {
            ip: ip.to_string(),
            ..Default::default()
        })
        .collect()
}

/// The single subset barrelman maintains for a service. A service without
/// ready backends is an error so the key is retried instead of emptied.
pub fn endpoint_subset(service: &Service, nodes: &[Arc<Node>]) -> Result<EndpointSubset> {
    let ports = endpoint_ports(service)?;

    let addresses = endpoint_addresses(nodes);
    if addresses.is_empty() {
        return Err(MirrorError::NoReadyAddresses(service_id(service)));
    }

    Ok(EndpointSubset {
        addresses: Some(addresses),
        ports: Some(ports),
        ..Default::default()
    })
}

/// A fresh Endpoints object backing `service`
pub fn new_endpoints(
    service: &Service,
    nodes: &[Arc<Node>],
    labels: BTreeMap<String, String>,
) -> Result<Endpoints> {
    let subset = endpoint_subset(service, nodes)?;

    Ok(Endpoints {
        metadata: ObjectMeta {
            name: service.metadata.name.clone(),
            namespace: service.metadata.namespace.clone(),
            labels: Some(labels),
            ..Default::default()
        },
        subsets: Some(vec![subset]),
    })
}

fn service_id(service: &Service) -> String {
    format!(
        "{}/{}",
        service.namespace().unwrap_or_default(),
        service.name_any()
    )
}
