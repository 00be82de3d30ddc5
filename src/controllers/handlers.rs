// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch notification filters that feed the work queues.

use crate::kubernetes::Subscriber;
use crate::metrics::MetricsSink;
use crate::queue::WorkQueue;
use crate::types::{NodeExt, ResourceKey, ResponsibilityPredicate};
use k8s_openapi::api::core::v1::{Node, Service};
use kube::runtime::reflector::Store;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Puts object keys on a controller's queue
#[derive(Clone)]
pub struct Enqueuer {
    controller: &'static str,
    queue: WorkQueue<String>,
    metrics: Arc<dyn MetricsSink>,
}

impl Enqueuer {
    pub fn new(
        controller: &'static str,
        queue: WorkQueue<String>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            controller,
            queue,
            metrics,
        }
    }

    pub fn enqueue<K: Resource>(&self, obj: &K) {
        let Some(key) = ResourceKey::from_resource(obj) else {
            warn!(controller = self.controller, "Couldn't get key for object without a name");
            return;
        };
        self.queue.add(key.to_string());
        self.metrics.object_queued(self.controller, false);
    }
}

/// Periodic resyncs replay objects with an unchanged resource version
fn resource_version_changed<K: Resource>(old: &K, new: &K) -> bool {
    old.resource_version() != new.resource_version()
}

fn describe<K: Resource>(obj: &K) -> String {
    match obj.namespace() {
        Some(ns) => format!("{}/{}", ns, obj.name_any()),
        None => obj.name_any(),
    }
}

/// Local services whose endpoints are mirrored
pub struct LocalServiceEvents {
    enqueuer: Enqueuer,
}

impl LocalServiceEvents {
    pub fn new(enqueuer: Enqueuer) -> Self {
        Self { enqueuer }
    }
}

impl Subscriber<Service> for LocalServiceEvents {
    fn on_add(&self, obj: &Service) {
        info!("ADD for Service {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }

    fn on_update(&self, old: &Service, new: &Service) {
        if !resource_version_changed(old, new) {
            debug!("RESYNC (event skipped) for Service {}", describe(new));
            return;
        }
        info!("UPDATE for Service {}", describe(new));
        self.enqueuer.enqueue(new);
    }

    fn on_delete(&self, obj: &Service) {
        info!("DELETE for Service {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }
}

/// Whether a node update can change any mirrored endpoint set
pub fn node_change_is_relevant(old: &Node, new: &Node) -> bool {
    old.is_ready() != new.is_ready() || old.internal_ip() != new.internal_ip()
}

/// Remote nodes; every relevant change re-enqueues all local services
pub struct NodeEvents {
    enqueuer: Enqueuer,
    services: Store<Service>,
    metrics: Arc<dyn MetricsSink>,
}

impl NodeEvents {
    pub fn new(
        enqueuer: Enqueuer,
        services: Store<Service>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            enqueuer,
            services,
            metrics,
        }
    }

    fn enqueue_all_services(&self) {
        let services = self.services.state();
        for service in &services {
            self.enqueuer.enqueue(service.as_ref());
        }
        info!("Enqueued {} services", services.len());
    }
}

impl Subscriber<Node> for NodeEvents {
    fn on_add(&self, obj: &Node) {
        self.metrics.node_count_changed(1);
        info!("ADD for Node {}", obj.name_any());

        if !obj.is_ready() {
            warn!("Node {} is not ready", obj.name_any());
            return;
        }
        let Some(ip) = obj.internal_ip() else {
            warn!("Node {} has no internal IP", obj.name_any());
            return;
        };
        debug!("InternalIP: {}", ip);

        self.enqueue_all_services();
    }

    fn on_update(&self, old: &Node, new: &Node) {
        if !resource_version_changed(old, new) {
            debug!("RESYNC (event skipped) for Node {}", new.name_any());
            return;
        }
        if !node_change_is_relevant(old, new) {
            return;
        }

        info!("UPDATE for Node {}", new.name_any());
        self.enqueue_all_services();
    }

    fn on_delete(&self, obj: &Node) {
        self.metrics.node_count_changed(-1);
        info!("DELETE for Node {}", obj.name_any());
        self.enqueue_all_services();
    }
}

/// Remote services, filtered by responsibility
pub struct RemoteServiceEvents {
    enqueuer: Enqueuer,
    responsibility: ResponsibilityPredicate,
}

impl RemoteServiceEvents {
    pub fn new(enqueuer: Enqueuer, responsibility: ResponsibilityPredicate) -> Self {
        Self {
            enqueuer,
            responsibility,
        }
    }
}

impl Subscriber<Service> for RemoteServiceEvents {
    fn on_add(&self, obj: &Service) {
        if !self.responsibility.is_responsible(obj) {
            return;
        }
        info!("ADD remote service {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }

    fn on_update(&self, old: &Service, new: &Service) {
        if !resource_version_changed(old, new) {
            return;
        }
        // Losing responsibility must reach the reconciler so the mirror is removed
        if !self.responsibility.is_responsible(new) && !self.responsibility.is_responsible(old) {
            return;
        }
        info!("UPDATE remote service {}", describe(new));
        self.enqueuer.enqueue(new);
    }

    fn on_delete(&self, obj: &Service) {
        if !self.responsibility.is_responsible(obj) {
            return;
        }
        info!("DELETE remote service {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }
}

/// Local services created by the service mirror
pub struct OwnedServiceEvents {
    enqueuer: Enqueuer,
}

impl OwnedServiceEvents {
    pub fn new(enqueuer: Enqueuer) -> Self {
        Self { enqueuer }
    }
}

impl Subscriber<Service> for OwnedServiceEvents {
    fn on_add(&self, obj: &Service) {
        debug!("ADD local mirror {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }

    fn on_update(&self, old: &Service, new: &Service) {
        if resource_version_changed(old, new) {
            debug!("UPDATE local mirror {}", describe(new));
            self.enqueuer.enqueue(new);
        }
    }

    fn on_delete(&self, obj: &Service) {
        debug!("DELETE local mirror {}", describe(obj));
        self.enqueuer.enqueue(obj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubernetes::Dispatcher;
    use crate::metrics::Counters;
    use crate::test_utils::store_of;
    use crate::types::node::tests::{address, condition, make_node, ready_node};
    use crate::types::service::tests::{make_service, port};
    use kube::runtime::watcher::Event;
    use std::collections::BTreeMap;

    const CONTROLLER: &str = "test";

    fn setup() -> (Enqueuer, WorkQueue<String>, Arc<Counters>) {
        let queue = WorkQueue::new(CONTROLLER);
        let counters = Arc::new(Counters::default());
        (Enqueuer::new(CONTROLLER, queue.clone(), counters.clone()), queue, counters)
    }

    fn with_rv<K: Resource>(mut obj: K, rv: &str) -> K {
        obj.meta_mut().resource_version = Some(rv.to_string());
        obj
    }

    fn node_port_service(ns: &str, name: &str) -> Service {
        make_service(ns, name, "NodePort", vec![port("http", 80, Some(30080))])
    }

    async fn drain(queue: &WorkQueue<String>) -> Vec<String> {
        let mut keys = Vec::new();
        while !queue.is_empty() {
            if let Some(key) = queue.get().await {
                queue.done(&key);
                keys.push(key);
            }
        }
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_local_service_resync_is_skipped() {
        let (enqueuer, queue, counters) = setup();
        let events = LocalServiceEvents::new(enqueuer);
        let svc = with_rv(node_port_service("ns", "a"), "1");

        events.on_update(&svc, &svc);
        assert!(queue.is_empty());

        events.on_update(&svc, &with_rv(svc.clone(), "2"));
        events.on_delete(&svc);
        assert_eq!(drain(&queue).await, vec!["ns/a"]);
        assert_eq!(counters.queued(CONTROLLER, false), 2);
    }

    #[test]
    fn test_node_change_relevance() {
        let ready = ready_node("n", "10.0.0.1");
        let not_ready = make_node(
            "n",
            vec![address("InternalIP", "10.0.0.1")],
            vec![condition("Ready", "False")],
        );
        let moved = ready_node("n", "10.0.0.9");
        let no_ip = make_node("n", vec![], vec![condition("Ready", "True")]);

        assert!(!node_change_is_relevant(&ready, &ready));
        assert!(node_change_is_relevant(&ready, &not_ready));
        assert!(node_change_is_relevant(&ready, &moved));
        assert!(node_change_is_relevant(&ready, &no_ip));
        assert!(node_change_is_relevant(&no_ip, &ready));
        assert!(!node_change_is_relevant(&no_ip, &no_ip));
    }

    #[tokio::test]
    async fn test_node_events_broadcast_to_all_services() {
        let (enqueuer, queue, counters) = setup();
        let services = store_of(vec![node_port_service("a", "one"), node_port_service("b", "two")]);
        let events = NodeEvents::new(enqueuer, services, counters.clone());

        events.on_add(&with_rv(ready_node("n1", "10.0.0.1"), "1"));
        assert_eq!(drain(&queue).await, vec!["a/one", "b/two"]);

        events.on_delete(&ready_node("n1", "10.0.0.1"));
        assert_eq!(drain(&queue).await, vec!["a/one", "b/two"]);
        assert_eq!(counters.nodes(), 0);
    }

    #[tokio::test]
    async fn test_irrelevant_node_events_do_not_broadcast() {
        let (enqueuer, queue, counters) = setup();
        let services = store_of(vec![node_port_service("a", "one")]);
        let events = NodeEvents::new(enqueuer, services, counters.clone());

        let not_ready = make_node("n2", vec![address("InternalIP", "10.0.0.2")], vec![]);
        events.on_add(&not_ready);
        events.on_add(&make_node("n3", vec![], vec![condition("Ready", "True")]));
        assert!(queue.is_empty());
        assert_eq!(counters.nodes(), 2);

        // Unchanged ready node with a new resource version (e.g. heartbeat)
        let mut heartbeat = with_rv(ready_node("n1", "10.0.0.1"), "2");
        heartbeat.metadata.labels = Some(BTreeMap::from([("x".to_string(), "y".to_string())]));
        events.on_update(&with_rv(ready_node("n1", "10.0.0.1"), "1"), &heartbeat);
        events.on_update(&heartbeat, &heartbeat);
        assert!(queue.is_empty());

        let became_ready = with_rv(ready_node("n2", "10.0.0.2"), "3");
        events.on_update(&not_ready, &became_ready);
        assert_eq!(drain(&queue).await, vec!["a/one"]);
    }

    fn node_dispatcher(
        enqueuer: Enqueuer,
        counters: Arc<Counters>,
        services: Vec<Service>,
    ) -> Dispatcher<Node> {
        let mut nodes = Dispatcher::new();
        nodes.subscribe(Arc::new(NodeEvents::new(
            enqueuer,
            store_of(services),
            counters,
        )));
        nodes
    }

    #[tokio::test]
    async fn test_node_missing_from_relist_lowers_gauge_and_broadcasts_once() {
        let (enqueuer, queue, counters) = setup();
        let services = vec![node_port_service("a", "one"), node_port_service("b", "two")];
        let mut nodes = node_dispatcher(enqueuer, counters.clone(), services);

        nodes.apply(Event::Init);
        nodes.apply(Event::InitApply(with_rv(ready_node("n1", "10.0.0.1"), "1")));
        nodes.apply(Event::InitApply(with_rv(ready_node("n2", "10.0.0.2"), "1")));
        nodes.apply(Event::InitDone);
        assert_eq!(counters.nodes(), 2);
        drain(&queue).await;
        let queued = counters.queued(CONTROLLER, false);

        // n2 went away while the watch was down
        nodes.apply(Event::Init);
        nodes.apply(Event::InitApply(with_rv(ready_node("n1", "10.0.0.1"), "1")));
        nodes.apply(Event::InitDone);

        assert_eq!(counters.nodes(), 1);
        assert_eq!(counters.queued(CONTROLLER, false) - queued, 2);
        assert_eq!(drain(&queue).await, vec!["a/one", "b/two"]);
    }

    #[tokio::test]
    async fn test_node_resync_enqueues_nothing() {
        let (enqueuer, queue, counters) = setup();
        let services = vec![node_port_service("a", "one")];
        let mut nodes = node_dispatcher(enqueuer, counters.clone(), services);

        nodes.apply(Event::Apply(with_rv(ready_node("n1", "10.0.0.1"), "1")));
        nodes.apply(Event::Apply(with_rv(
            make_node("n2", vec![address("InternalIP", "10.0.0.2")], vec![]),
            "1",
        )));
        drain(&queue).await;
        let queued = counters.queued(CONTROLLER, false);

        nodes.resync();

        assert!(queue.is_empty());
        assert_eq!(counters.queued(CONTROLLER, false), queued);
        assert_eq!(counters.nodes(), 2);
    }

    #[tokio::test]
    async fn test_remote_service_events_filter_by_responsibility() {
        let (enqueuer, queue, _) = setup();
        let events = RemoteServiceEvents::new(enqueuer, ResponsibilityPredicate::default());

        events.on_add(&make_service("ns", "cluster-ip", "ClusterIP", vec![port("http", 80, None)]));
        events.on_add(&node_port_service("kube-system", "dns"));
        events.on_delete(&make_service("ns", "cluster-ip", "ClusterIP", vec![]));
        assert!(queue.is_empty());

        events.on_add(&node_port_service("ns", "web"));
        assert_eq!(drain(&queue).await, vec!["ns/web"]);
    }

    #[tokio::test]
    async fn test_remote_service_losing_node_port_is_enqueued() {
        let (enqueuer, queue, _) = setup();
        let events = RemoteServiceEvents::new(enqueuer, ResponsibilityPredicate::default());

        let old = with_rv(node_port_service("ns", "web"), "1");
        let cluster_ip = make_service("ns", "web", "ClusterIP", vec![port("http", 80, None)]);
        let new = with_rv(cluster_ip, "2");
        events.on_update(&old, &new);
        assert_eq!(drain(&queue).await, vec!["ns/web"]);

        let other_old = with_rv(make_service("ns", "db", "ClusterIP", vec![]), "1");
        let other_new = with_rv(make_service("ns", "db", "ClusterIP", vec![]), "2");
        events.on_update(&other_old, &other_new);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_owned_service_events() {
        let (enqueuer, queue, _) = setup();
        let events = OwnedServiceEvents::new(enqueuer);
        let svc = with_rv(make_service("ns", "web", "ClusterIP", vec![]), "1");

        events.on_update(&svc, &svc);
        assert!(queue.is_empty());

        events.on_add(&svc);
        events.on_delete(&svc);
        assert_eq!(drain(&queue).await, vec!["ns/web"]);
    }
}
