// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Counters reported by the event handlers and reconciliation loops.

use crate::types::ActionType;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Receives operational counters; exporting them is up to the implementation
pub trait MetricsSink: Send + Sync {
    /// A key was put on a controller's queue (`requeue` for retries after failure)
    fn object_queued(&self, controller: &'static str, requeue: bool);

    fn reconcile_succeeded(&self, controller: &'static str, action: ActionType);

    /// `action` is set when the failure happened while executing that action
    fn reconcile_failed(&self, controller: &'static str, action: Option<ActionType>);

    /// Remote node count moved by `delta`
    fn node_count_changed(&self, delta: i64);
}

/// In-process metrics store
#[derive(Default)]
pub struct Counters {
    queued: Mutex<HashMap<(&'static str, bool), u64>>,
    succeeded: Mutex<HashMap<(&'static str, ActionType), u64>>,
    failed: Mutex<HashMap<(&'static str, Option<ActionType>), u64>>,
    nodes: AtomicI64,
}

fn bump<K: Eq + std::hash::Hash>(map: &Mutex<HashMap<K, u64>>, key: K) {
    *map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(key)
        .or_insert(0) += 1;
}

fn read<K: Eq + std::hash::Hash>(map: &Mutex<HashMap<K, u64>>, key: &K) -> u64 {
    map.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .copied()
        .unwrap_or(0)
}

impl Counters {
    pub fn queued(&self, controller: &'static str, requeue: bool) -> u64 {
        read(&self.queued, &(controller, requeue))
    }

    pub fn succeeded(&self, controller: &'static str, action: ActionType) -> u64 {
        read(&self.succeeded, &(controller, action))
    }

    pub fn failed(&self, controller: &'static str, action: Option<ActionType>) -> u64 {
        read(&self.failed, &(controller, action))
    }

    pub fn nodes(&self) -> i64 {
        self.nodes.load(Ordering::Relaxed)
    }
}

impl MetricsSink for Counters {
    fn object_queued(&self, controller: &'static str, requeue: bool) {
        bump(&self.queued, (controller, requeue));
    }

    fn reconcile_succeeded(&self, controller: &'static str, action: ActionType) {
        bump(&self.succeeded, (controller, action));
    }

    fn reconcile_failed(&self, controller: &'static str, action: Option<ActionType>) {
        bump(&self.failed, (controller, action));
    }

    fn node_count_changed(&self, delta: i64) {
        self.nodes.fetch_add(delta, Ordering::Relaxed);
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = Vec::new();

        let queued = self.queued.lock().unwrap_or_else(PoisonError::into_inner);
        for ((controller, requeue), n) in queued.iter() {
            lines.push(format!("queued{{controller={controller},requeue={requeue}}} {n}"));
        }
        let succeeded = self.succeeded.lock().unwrap_or_else(PoisonError::into_inner);
        for ((controller, action), n) in succeeded.iter() {
            lines.push(format!("succeeded{{controller={controller},action={action}}} {n}"));
        }
        let failed = self.failed.lock().unwrap_or_else(PoisonError::into_inner);
        for ((controller, action), n) in failed.iter() {
            let action = action.map(|a| a.as_str()).unwrap_or("-");
            lines.push(format!("failed{{controller={controller},action={action}}} {n}"));
        }
        lines.sort();
        lines.push(format!("nodes {}", self.nodes()));

        f.write_str(&lines.join(", "))
    }
}
