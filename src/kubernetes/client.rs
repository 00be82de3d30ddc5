// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local and remote cluster client creation

use crate::config::Config;
use crate::error::{MirrorError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::Path;
use tracing::{info, instrument};

/// Client for the cluster barrelman writes to
#[instrument(skip(config))]
pub async fn create_local_client(config: &Config) -> Result<Client> {
    match &config.local_kubeconfig {
        Some(path) => {
            info!("Using local kubeconfig {}", path.display());
            create_client_from_file(path, config.local_context.as_deref()).await
        }
        None => {
            info!("Inferring local cluster configuration");
            Client::try_default().await.map_err(|e| {
                MirrorError::KubeconfigError(format!("Failed to infer local config: {}", e))
            })
        }
    }
}

/// Client for the cluster barrelman reads services and nodes from
#[instrument(skip(config))]
pub async fn create_remote_client(config: &Config) -> Result<Client> {
    info!("Using remote kubeconfig {}", config.remote_kubeconfig.display());
    create_client_from_file(&config.remote_kubeconfig, config.remote_context.as_deref()).await
}

async fn create_client_from_file(path: &Path, context: Option<&str>) -> Result<Client> {
    let kubeconfig = tokio::fs::read_to_string(path).await.map_err(|e| {
        MirrorError::KubeconfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    create_client_from_kubeconfig(&kubeconfig, context).await
}

/// Create a Kubernetes client from a kubeconfig string
pub async fn create_client_from_kubeconfig(
    kubeconfig: &str,
    context: Option<&str>,
) -> Result<Client> {
    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| MirrorError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };
    let client_config = kube::Config::from_custom_kubeconfig(kubeconfig_parsed, &options)
        .await
        .map_err(|e| MirrorError::KubeconfigError(format!("Failed to create config: {}", e)))?;

    Client::try_from(client_config)
        .map_err(|e| MirrorError::KubeconfigError(format!("Failed to create client: {}", e)))
}
