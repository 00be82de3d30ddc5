// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Value types and pure decision helpers shared by both mirrors.

pub mod action;
pub mod endpoints;
pub mod key;
pub mod namespaces;
pub mod node;
pub mod service;

pub use action::ActionType;
pub use key::ResourceKey;
pub use namespaces::IgnoredNamespaces;
pub use node::NodeExt;
pub use service::{OwnershipPredicate, ResponsibilityPredicate, ServiceType};
