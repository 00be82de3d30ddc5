// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for watch caches, client creation, and namespace management.

pub mod cache;
pub mod client;
pub mod namespaces;

pub use cache::{Dispatcher, Informer, Subscriber};
pub use client::{create_local_client, create_remote_client};
pub use namespaces::ensure_namespace_exists;
