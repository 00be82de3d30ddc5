// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers that converge local objects towards the remote cluster.

pub mod endpoints;
pub mod services;

pub use endpoints::EndpointMirror;
pub use services::{local_action, ServiceMirror};
