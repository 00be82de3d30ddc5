// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Level-triggered reconciliation loop shared by both mirrors.

use crate::error::{MirrorError, Result};
use crate::metrics::MetricsSink;
use crate::queue::WorkQueue;
use crate::types::{ActionType, ResourceKey};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reconciles the state behind one key
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Controller name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Resolves once every cache `reconcile` reads from has completed its initial list
    async fn wait_for_sync(&self) -> Result<()>;

    async fn reconcile(&self, key: &ResourceKey) -> Result<ActionType>;
}

/// Worker pool draining a work queue into a [`Reconcile`] implementation
pub struct KeyedLoop<R> {
    reconciler: Arc<R>,
    queue: WorkQueue<String>,
    metrics: Arc<dyn MetricsSink>,
}

impl<R> Clone for KeyedLoop<R> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            queue: self.queue.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<R: Reconcile> KeyedLoop<R> {
    pub fn new(
        reconciler: Arc<R>,
        queue: WorkQueue<String>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            reconciler,
            queue,
            metrics,
        }
    }

    pub fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }

    /// Run `workers` workers until `shutdown` fires, then drain the queue and
    /// wait for every worker to return
    pub async fn run(self, workers: usize, shutdown: CancellationToken) -> Result<()> {
        let controller = self.reconciler.name();
        info!(controller, "Waiting for informer caches to sync");

        let synced = tokio::select! {
            res = self.reconciler.wait_for_sync() => res,
            _ = shutdown.cancelled() => Err(MirrorError::CacheSyncFailed(format!(
                "{controller}: shut down before caches synced"
            ))),
        };
        if let Err(e) = synced {
            self.queue.shut_down();
            return Err(e);
        }

        info!(controller, workers, "Starting workers");
        let mut pool = JoinSet::new();
        for _ in 0..workers.max(1) {
            let worker = self.clone();
            pool.spawn(async move { while worker.process_next_item().await {} });
        }

        shutdown.cancelled().await;
        info!(controller, "Shutting down workers");
        self.queue.shut_down();

        while let Some(res) = pool.join_next().await {
            if let Err(e) = res {
                error!(controller, "Worker failed: {}", e);
            }
        }
        info!(controller, "Workers stopped");
        Ok(())
    }

    /// Process one key; `false` once the queue is shut down and drained
    pub async fn process_next_item(&self) -> bool {
        let Some(key) = self.queue.get().await else {
            return false;
        };
        if AssertUnwindSafe(self.process(&key)).catch_unwind().await.is_err() {
            let controller = self.reconciler.name();
            error!(controller, key = %key, "Reconcile panicked, requeueing");
            self.metrics.reconcile_failed(controller, None);
            self.metrics.object_queued(controller, true);
            self.queue.add_rate_limited(key.clone());
        }
        self.queue.done(&key);
        true
    }

    async fn process(&self, key: &String) {
        let controller = self.reconciler.name();

        let resource_key: ResourceKey = match key.parse() {
            Ok(k) => k,
            Err(e) => {
                warn!(controller, key = %key, "Dropping key: {}", e);
                self.queue.forget(key);
                return;
            }
        };

        match self.reconciler.reconcile(&resource_key).await {
            Ok(action) => {
                debug!(controller, key = %key, %action, "Successfully synced");
                self.queue.forget(key);
                self.metrics.reconcile_succeeded(controller, action);
            }
            Err(e) => {
                error!(controller, key = %key, "Error syncing, requeueing: {}", e);
                self.metrics.reconcile_failed(controller, e.action());
                self.metrics.object_queued(controller, true);
                self.queue.add_rate_limited(key.clone());
            }
        }
    }
}
