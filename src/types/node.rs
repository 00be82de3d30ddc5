// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::Node;

const CONDITION_READY: &str = "Ready";
const CONDITION_NETWORK_UNAVAILABLE: &str = "NetworkUnavailable";
const ADDRESS_INTERNAL_IP: &str = "InternalIP";

/// Readiness and addressing of remote cluster nodes
pub trait NodeExt {
    /// Ready only with an explicit `Ready=True` condition and no network
    /// outage reported. A node without conditions is never ready.
    fn is_ready(&self) -> bool;

    /// First `InternalIP` address of the node
    fn internal_ip(&self) -> Option<&str>;
}

impl NodeExt for Node {
    fn is_ready(&self) -> bool {
        let Some(conditions) = self.status.as_ref().and_then(|s| s.conditions.as_ref()) else {
            return false;
        };

        let ready = conditions
            .iter()
            .any(|c| c.type_ == CONDITION_READY && c.status == "True");
        let network_unavailable = conditions
            .iter()
            .any(|c| c.type_ == CONDITION_NETWORK_UNAVAILABLE && c.status != "False");

        ready && !network_unavailable
    }

    fn internal_ip(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())?
            .iter()
            .find(|a| a.type_ == ADDRESS_INTERNAL_IP)
            .map(|a| a.address.as_str())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeCondition, NodeStatus};
    use kube::api::ObjectMeta;

    pub(crate) fn condition(type_: &str, status: &str) -> NodeCondition {
        NodeCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn address(type_: &str, address: &str) -> NodeAddress {
        NodeAddress {
            type_: type_.to_string(),
            address: address.to_string(),
        }
    }

    pub(crate) fn make_node(
        name: &str,
        addresses: Vec<NodeAddress>,
        conditions: Vec<NodeCondition>,
    ) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: Some(addresses),
                conditions: Some(conditions),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// A ready node with the given internal IP
    pub(crate) fn ready_node(name: &str, ip: &str) -> Node {
        make_node(
            name,
            vec![address("InternalIP", ip)],
            vec![condition("Ready", "True")],
        )
    }

    #[test]
    fn test_is_ready_without_status() {
        assert!(!Node::default().is_ready());
    }

    #[test]
    fn test_is_ready_with_ready_condition() {
        let node = make_node(
            "n",
            vec![],
            vec![
                condition("Ready", "True"),
                condition("DiskPressure", "True"),
                condition("NetworkUnavailable", "False"),
            ],
        );
        assert!(node.is_ready());
    }

    #[test]
    fn test_is_ready_with_not_ready_condition() {
        let node = make_node("n", vec![], vec![condition("Ready", "False")]);
        assert!(!node.is_ready());
    }

    #[test]
    fn test_is_ready_with_network_unavailable() {
        let node = make_node(
            "n",
            vec![],
            vec![condition("Ready", "True"), condition("NetworkUnavailable", "True")],
        );
        assert!(!node.is_ready());

        let unknown = make_node(
            "n",
            vec![],
            vec![condition("NetworkUnavailable", "Unknown"), condition("Ready", "True")],
        );
        assert!(!unknown.is_ready());
    }

    #[test]
    fn test_is_ready_network_ok_but_no_ready_condition() {
        let node = make_node("n", vec![], vec![condition("NetworkUnavailable", "False")]);
        assert!(!node.is_ready());
    }

    #[test]
    fn test_internal_ip_missing() {
        assert_eq!(Node::default().internal_ip(), None);

        let external_only = make_node("n", vec![address("ExternalIP", "1.2.3.4")], vec![]);
        assert_eq!(external_only.internal_ip(), None);
    }

    #[test]
    fn test_internal_ip_picks_first_internal() {
        let node = make_node(
            "n",
            vec![
                address("ExternalIP", "8.8.8.8"),
                address("InternalIP", "1.2.3.4"),
                address("InternalIP", "4.3.2.1"),
            ],
            vec![],
        );
        assert_eq!(node.internal_ip(), Some("1.2.3.4"));
    }
}
