// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Watch caches: a reflector store kept up to date from a watch stream, with
//! add/update/delete notifications for subscribers.

use crate::error::{MirrorError, Result};
use futures::StreamExt;
use kube::runtime::reflector::{self, store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use kube_runtime::watcher::Config as WatcherConfig;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Receives change notifications from a watch cache
pub trait Subscriber<K>: Send + Sync {
    fn on_add(&self, obj: &K);
    fn on_update(&self, old: &K, new: &K);
    fn on_delete(&self, obj: &K);
}

enum Notification<K> {
    Add(K),
    Update(Arc<K>, K),
    Delete(K),
}

/// Notifications of a relist, held back until the store has been swapped
struct Relist<K: Resource> {
    seen: HashSet<ObjectRef<K>>,
    pending: Vec<Notification<K>>,
}

impl<K: Resource> Default for Relist<K> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            pending: Vec::new(),
        }
    }
}

/// Applies watch events to a store and fans them out to subscribers
pub struct Dispatcher<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    writer: Writer<K>,
    reader: Store<K>,
    subscribers: Vec<Arc<dyn Subscriber<K>>>,
    relist: Option<Relist<K>>,
}

impl<K> Dispatcher<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    pub fn new() -> Self {
        let (reader, writer) = reflector::store();
        Self {
            writer,
            reader,
            subscribers: Vec::new(),
            relist: None,
        }
    }

    pub fn store(&self) -> Store<K> {
        self.reader.clone()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber<K>>) {
        self.subscribers.push(subscriber);
    }

    /// Apply a watch event to the store, then notify subscribers.
    ///
    /// Objects of a relist are announced once the relist completes, followed by
    /// deletes for cached objects the relist no longer contains.
    pub fn apply(&mut self, event: watcher::Event<K>) {
        match event {
            watcher::Event::Apply(obj) => {
                let old = self.reader.get(&ObjectRef::from_obj(&obj));
                self.writer.apply_watcher_event(&watcher::Event::Apply(obj.clone()));
                self.notify(match old {
                    Some(old) => Notification::Update(old, obj),
                    None => Notification::Add(obj),
                });
            }
            watcher::Event::Delete(obj) => {
                self.writer.apply_watcher_event(&watcher::Event::Delete(obj.clone()));
                self.notify(Notification::Delete(obj));
            }
            watcher::Event::Init => {
                self.relist = Some(Relist::default());
                self.writer.apply_watcher_event(&watcher::Event::Init);
            }
            watcher::Event::InitApply(obj) => {
                let obj_ref = ObjectRef::from_obj(&obj);
                // The reader serves the pre-relist state until InitDone
                let notification = match self.reader.get(&obj_ref) {
                    Some(old) => Notification::Update(old, obj.clone()),
                    None => Notification::Add(obj.clone()),
                };
                self.writer.apply_watcher_event(&watcher::Event::InitApply(obj));

                let relist = self.relist.get_or_insert_with(Relist::default);
                relist.seen.insert(obj_ref);
                relist.pending.push(notification);
            }
            watcher::Event::InitDone => {
                let relist = self.relist.take().unwrap_or_default();
                let stale: Vec<Arc<K>> = self
                    .reader
                    .state()
                    .into_iter()
                    .filter(|obj| !relist.seen.contains(&ObjectRef::from_obj(obj.as_ref())))
                    .collect();
                self.writer.apply_watcher_event(&watcher::Event::InitDone);

                for notification in relist.pending {
                    self.notify(notification);
                }
                for obj in stale {
                    self.notify(Notification::Delete(obj.as_ref().clone()));
                }
            }
        }
    }

    /// Replay every cached object as an unchanged update
    pub fn resync(&self) {
        for obj in self.reader.state() {
            for subscriber in &self.subscribers {
                subscriber.on_update(&obj, &obj);
            }
        }
    }

    fn notify(&self, notification: Notification<K>) {
        for subscriber in &self.subscribers {
            match &notification {
                Notification::Add(obj) => subscriber.on_add(obj),
                Notification::Update(old, new) => subscriber.on_update(old, new),
                Notification::Delete(obj) => subscriber.on_delete(obj),
            }
        }
    }
}

impl<K> Default for Dispatcher<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Watches one resource type in one cluster
pub struct Informer<K>
where
    K: Resource + Clone + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    name: &'static str,
    api: Api<K>,
    config: WatcherConfig,
    resync: Option<Duration>,
    dispatcher: Dispatcher<K>,
}

impl<K> Informer<K>
where
    K: Resource + Clone + Debug + Send + Sync + DeserializeOwned + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    /// A `resync` period of zero disables periodic replays
    pub fn new(name: &'static str, api: Api<K>, config: WatcherConfig, resync: Duration) -> Self {
        Self {
            name,
            api,
            config,
            resync: (!resync.is_zero()).then_some(resync),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn store(&self) -> Store<K> {
        self.dispatcher.store()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn Subscriber<K>>) {
        self.dispatcher.subscribe(subscriber);
    }

    /// Run the watch until `shutdown` fires
    #[instrument(skip(self, shutdown), fields(informer = self.name))]
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        info!("Starting watch");

        let stream = watcher(self.api.clone(), self.config.clone()).default_backoff();
        tokio::pin!(stream);

        let mut resync = self
            .resync
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Stopping watch");
                    return Ok(());
                }
                _ = tick(&mut resync) => {
                    debug!("Resyncing cached objects");
                    self.dispatcher.resync();
                }
                event = stream.next() => match event {
                    Some(Ok(event)) => self.dispatcher.apply(event),
                    Some(Err(e)) => warn!("Watch error: {}", e),
                    None => return Err(MirrorError::WatchEnded(self.name.to_string())),
                },
            }
        }
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
