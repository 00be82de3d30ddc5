// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service classification and local mirror port synthesis.

use crate::constants::labels;
use crate::error::{MirrorError, Result};
use crate::types::namespaces::IgnoredNamespaces;
use k8s_openapi::api::core::v1::{Service, ServicePort};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    ClusterIP,
    NodePort,
    LoadBalancer,
    ExternalName,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIP => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
            ServiceType::ExternalName => "ExternalName",
        }
    }

    /// Type of a service; the API server defaults an unset type to ClusterIP
    pub fn of(service: &Service) -> Option<Self> {
        match service.spec.as_ref().and_then(|s| s.type_.as_deref()) {
            None => Some(ServiceType::ClusterIP),
            Some(t) => t.parse().ok(),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ClusterIP" => Ok(ServiceType::ClusterIP),
            "NodePort" => Ok(ServiceType::NodePort),
            "LoadBalancer" => Ok(ServiceType::LoadBalancer),
            "ExternalName" => Ok(ServiceType::ExternalName),
            other => Err(MirrorError::InvalidConfig(format!(
                "unknown service type {other:?}"
            ))),
        }
    }
}

/// Decides which services barrelman acts on
#[derive(Debug, Clone)]
pub struct ResponsibilityPredicate {
    pub ignored_namespaces: IgnoredNamespaces,
    pub annotation_key: String,
    pub ignore_value: String,
}

impl ResponsibilityPredicate {
    /// Remote services are mirrored when they are NodePort services outside
    /// the ignored namespaces and not opted out by annotation
    pub fn is_responsible(&self, service: &Service) -> bool {
        ServiceType::of(service) == Some(ServiceType::NodePort) && self.is_eligible(service)
    }

    /// Namespace and annotation checks only; applied to local mirrors, which
    /// usually are not NodePort services themselves
    pub fn is_eligible(&self, service: &Service) -> bool {
        if self
            .ignored_namespaces
            .is_ignored(&service.namespace().unwrap_or_default())
        {
            return false;
        }

        service.annotations().get(&self.annotation_key) != Some(&self.ignore_value)
    }
}

impl Default for ResponsibilityPredicate {
    fn default() -> Self {
        Self {
            ignored_namespaces: IgnoredNamespaces::default(),
            annotation_key: labels::KEY.to_string(),
            ignore_value: labels::IGNORE.to_string(),
        }
    }
}

/// Identifies local objects created by barrelman
#[derive(Debug, Clone)]
pub struct OwnershipPredicate {
    pub label_key: String,
    pub managed_value: String,
}

impl OwnershipPredicate {
    pub fn owns<K: Resource>(&self, obj: &K) -> bool {
        obj.labels()
            .get(&self.label_key)
            .is_some_and(|v| *v == self.managed_value)
    }

    /// Labels stamped on every object barrelman creates
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.label_key.clone(), self.managed_value.clone())])
    }

    /// Label selector matching the objects barrelman owns
    pub fn selector(&self) -> String {
        format!("{}={}", self.label_key, self.managed_value)
    }
}

impl Default for OwnershipPredicate {
    fn default() -> Self {
        Self {
            label_key: labels::KEY.to_string(),
            managed_value: labels::MANAGED_RESOURCE.to_string(),
        }
    }
}

/// Ports for the local mirror of `remote`: traffic is sent to the remote
/// node port, and the node port itself is only kept for NodePort mirrors
pub fn dummy_service_ports(remote: &Service, local_type: ServiceType) -> Result<Vec<ServicePort>> {
    let ports = remote
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();

    ports
        .iter()
        .map(|port| {
            let node_port = port.node_port.ok_or_else(|| MirrorError::NoNodePort {
                service: format!(
                    "{}/{}",
                    remote.namespace().unwrap_or_default(),
                    remote.name_any()
                ),
                port: port.name.clone().unwrap_or_else(|| port.port.to_string()),
            })?;

            Ok(ServicePort {
                target_port: Some(IntOrString::Int(node_port)),
                node_port: (local_type == ServiceType::NodePort).then_some(node_port),
                ..port.clone()
            })
        })
        .collect()
}

/// Order-independent comparison of two port lists
pub fn service_ports_equal(a: &[ServicePort], b: &[ServicePort]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut unmatched: Vec<&ServicePort> = b.iter().collect();
    for port in a {
        match unmatched.iter().position(|candidate| *candidate == port) {
            Some(idx) => {
                unmatched.swap_remove(idx);
            }
            None => return false,
        }
    }
    true
}
