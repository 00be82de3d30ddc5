// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{defaults, labels};
use crate::types::{IgnoredNamespaces, OwnershipPredicate, ResponsibilityPredicate, ServiceType};
use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Mirror configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Kubeconfig for the local cluster; inferred (in-cluster or default) when unset
    pub local_kubeconfig: Option<PathBuf>,
    pub local_context: Option<String>,
    pub remote_kubeconfig: PathBuf,
    pub remote_context: Option<String>,
    /// Zero disables periodic resyncs
    pub resync_period: Duration,
    pub endpoint_workers: usize,
    pub service_workers: usize,
    /// Type of the local services created for remote NodePort services
    pub local_service_type: ServiceType,
    pub ignored_namespaces: IgnoredNamespaces,
    pub label_key: String,
    pub managed_value: String,
    pub ignore_value: String,
    /// Label selector for local services whose endpoints are mirrored
    pub endpoints_service_selector: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let remote_kubeconfig = var("REMOTE_KUBECONFIG")
            .map(PathBuf::from)
            .context("REMOTE_KUBECONFIG environment variable not set")?;

        let resync_secs: u64 = parse_or(
            var("RESYNC_PERIOD_SECS"),
            "RESYNC_PERIOD_SECS",
            defaults::RESYNC_PERIOD_SECS,
        )?;
        let endpoint_workers = workers(
            var("ENDPOINT_WORKERS"),
            "ENDPOINT_WORKERS",
            defaults::ENDPOINT_WORKERS,
        )?;
        let service_workers = workers(
            var("SERVICE_WORKERS"),
            "SERVICE_WORKERS",
            defaults::SERVICE_WORKERS,
        )?;

        let local_service_type = match var("LOCAL_SERVICE_TYPE") {
            None => ServiceType::ClusterIP,
            Some(value) => {
                let parsed: ServiceType = value.parse().context("Invalid LOCAL_SERVICE_TYPE")?;
                if !matches!(parsed, ServiceType::ClusterIP | ServiceType::NodePort) {
                    bail!("LOCAL_SERVICE_TYPE must be ClusterIP or NodePort, got {}", parsed);
                }
                parsed
            }
        };

        let mut ignored_namespaces = IgnoredNamespaces::default();
        if let Some(list) = var("IGNORE_NAMESPACES") {
            for entry in list.split(',') {
                ignored_namespaces
                    .apply(entry.trim())
                    .context("Invalid IGNORE_NAMESPACES")?;
            }
        }

        let label_key = var("LABEL_KEY").unwrap_or_else(|| labels::KEY.to_string());
        let managed_value =
            var("MANAGED_VALUE").unwrap_or_else(|| labels::MANAGED_RESOURCE.to_string());
        let ignore_value = var("IGNORE_VALUE").unwrap_or_else(|| labels::IGNORE.to_string());
        let endpoints_service_selector = var("ENDPOINTS_SERVICE_SELECTOR").unwrap_or_else(|| {
            format!("{} in ({},{})", label_key, labels::UPSTREAM, managed_value)
        });

        Ok(Config {
            local_kubeconfig: var("LOCAL_KUBECONFIG").map(PathBuf::from),
            local_context: var("LOCAL_CONTEXT"),
            remote_kubeconfig,
            remote_context: var("REMOTE_CONTEXT"),
            resync_period: Duration::from_secs(resync_secs),
            endpoint_workers,
            service_workers,
            local_service_type,
            ignored_namespaces,
            label_key,
            managed_value,
            ignore_value,
            endpoints_service_selector,
        })
    }

    pub fn responsibility(&self) -> ResponsibilityPredicate {
        ResponsibilityPredicate {
            ignored_namespaces: self.ignored_namespaces.clone(),
            annotation_key: self.label_key.clone(),
            ignore_value: self.ignore_value.clone(),
        }
    }

    pub fn ownership(&self) -> OwnershipPredicate {
        OwnershipPredicate {
            label_key: self.label_key.clone(),
            managed_value: self.managed_value.clone(),
        }
    }
}

fn parse_or<T>(value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse().with_context(|| format!("Invalid {name}: {v:?}")),
    }
}

fn workers(value: Option<String>, name: &str, default: usize) -> Result<usize> {
    let n = parse_or(value, name, default)?;
    if n == 0 {
        bail!("{name} must be at least 1");
    }
    Ok(n)
}
