// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Service};
use kube::Api;
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use barrelman::config::Config;
use barrelman::constants::controllers;
use barrelman::controllers::{
    Enqueuer, KeyedLoop, LocalServiceEvents, NodeEvents, OwnedServiceEvents, RemoteServiceEvents,
};
use barrelman::kubernetes::{create_local_client, create_remote_client, Informer};
use barrelman::metrics::{Counters, MetricsSink};
use barrelman::queue::WorkQueue;
use barrelman::reconcilers::{EndpointMirror, ServiceMirror};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting barrelman");

    let config = Config::from_env()?;
    info!(
        local_service_type = %config.local_service_type,
        ignored_namespaces = %config.ignored_namespaces,
        resync_period = ?config.resync_period,
        "Configuration loaded"
    );

    let local = create_local_client(&config)
        .await
        .context("Failed to create local cluster client")?;
    let remote = create_remote_client(&config)
        .await
        .context("Failed to create remote cluster client")?;
    info!("Connected to local and remote clusters");

    let counters = Arc::new(Counters::default());
    let metrics: Arc<dyn MetricsSink> = counters.clone();
    let shutdown = CancellationToken::new();

    // Endpoint mirror: local labeled services x remote nodes
    let endpoint_queue = WorkQueue::new(controllers::ENDPOINTS);
    let endpoint_enqueuer =
        Enqueuer::new(controllers::ENDPOINTS, endpoint_queue.clone(), metrics.clone());

    let mut local_services = Informer::new(
        "local-services",
        Api::<Service>::all(local.clone()),
        WatcherConfig::default().labels(&config.endpoints_service_selector),
        config.resync_period,
    );
    local_services.subscribe(Arc::new(LocalServiceEvents::new(endpoint_enqueuer.clone())));

    let mut remote_nodes = Informer::new(
        "remote-nodes",
        Api::<Node>::all(remote.clone()),
        WatcherConfig::default(),
        config.resync_period,
    );
    remote_nodes.subscribe(Arc::new(NodeEvents::new(
        endpoint_enqueuer,
        local_services.store(),
        metrics.clone(),
    )));

    let endpoint_loop = KeyedLoop::new(
        Arc::new(EndpointMirror::new(
            local.clone(),
            local_services.store(),
            remote_nodes.store(),
            config.ownership(),
        )),
        endpoint_queue,
        metrics.clone(),
    );

    // Service mirror: remote services x local mirrors
    let service_queue = WorkQueue::new(controllers::SERVICES);
    let service_enqueuer =
        Enqueuer::new(controllers::SERVICES, service_queue.clone(), metrics.clone());

    let mut remote_services = Informer::new(
        "remote-services",
        Api::<Service>::all(remote),
        WatcherConfig::default(),
        config.resync_period,
    );
    remote_services.subscribe(Arc::new(RemoteServiceEvents::new(
        service_enqueuer.clone(),
        config.responsibility(),
    )));

    let mut owned_services = Informer::new(
        "owned-services",
        Api::<Service>::all(local.clone()),
        WatcherConfig::default().labels(&config.ownership().selector()),
        config.resync_period,
    );
    owned_services.subscribe(Arc::new(OwnedServiceEvents::new(service_enqueuer)));

    let service_loop = KeyedLoop::new(
        Arc::new(ServiceMirror::new(
            local,
            remote_services.store(),
            config.responsibility(),
            config.ownership(),
            config.local_service_type,
        )),
        service_queue,
        metrics,
    );

    tokio::spawn(wait_for_shutdown(shutdown.clone()));

    info!("Starting controllers...");
    let result = tokio::try_join!(
        local_services.run(shutdown.clone()),
        remote_nodes.run(shutdown.clone()),
        remote_services.run(shutdown.clone()),
        owned_services.run(shutdown.clone()),
        endpoint_loop.run(config.endpoint_workers, shutdown.clone()),
        service_loop.run(config.service_workers, shutdown.clone()),
    );
    shutdown.cancel();

    info!("Metrics: {}", counters);
    result?;

    info!("barrelman stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM
async fn wait_for_shutdown(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
