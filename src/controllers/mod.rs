// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Queue feeding and worker loops shared by the mirrors.

pub mod handlers;
pub mod runner;

pub use handlers::{
    Enqueuer, LocalServiceEvents, NodeEvents, OwnedServiceEvents, RemoteServiceEvents,
};
pub use runner::{KeyedLoop, Reconcile};
