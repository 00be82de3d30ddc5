// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::ActionType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Namespace creation failed: {0}")]
    NamespaceError(String),

    #[error("No service ports defined for service: {0}")]
    NoPortsDefined(String),

    #[error("No valid (ready) node IPs found for service: {0}")]
    NoReadyAddresses(String),

    #[error("Service {service} port {port} has no node port allocated")]
    NoNodePort { service: String, port: String },

    #[error("Invalid resource key: {0}")]
    MalformedKey(String),

    #[error("Failed to wait for caches to sync: {0}")]
    CacheSyncFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Watch stream for {0} ended")]
    WatchEnded(String),

    #[error("{action} failed: {source}")]
    ActionFailed {
        action: ActionType,
        #[source]
        source: Box<MirrorError>,
    },
}

impl MirrorError {
    /// Attribute an error to the service action that was being executed
    pub fn during(action: ActionType) -> impl FnOnce(MirrorError) -> MirrorError {
        move |source| MirrorError::ActionFailed {
            action,
            source: Box::new(source),
        }
    }

    /// The action that failed, when the error happened while executing one
    pub fn action(&self) -> Option<ActionType> {
        match self {
            MirrorError::ActionFailed { action, .. } => Some(*action),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
