// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Endpoint mirror: points local services at the ready nodes of the remote cluster.

use crate::constants::controllers;
use crate::controllers::Reconcile;
use crate::error::{MirrorError, Result};
use crate::types::endpoints::new_endpoints;
use crate::types::{ActionType, OwnershipPredicate, ResourceKey};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Node, Service};
use kube::api::PostParams;
use kube::runtime::reflector::Store;
use kube::{Api, Client};
use tracing::{info, instrument, warn};

pub struct EndpointMirror {
    client: Client,
    /// Local services selected for endpoint mirroring
    services: Store<Service>,
    /// Remote nodes
    nodes: Store<Node>,
    ownership: OwnershipPredicate,
}

impl EndpointMirror {
    pub fn new(
        client: Client,
        services: Store<Service>,
        nodes: Store<Node>,
        ownership: OwnershipPredicate,
    ) -> Self {
        Self {
            client,
            services,
            nodes,
            ownership,
        }
    }
}

#[async_trait]
impl Reconcile for EndpointMirror {
    fn name(&self) -> &'static str {
        controllers::ENDPOINTS
    }

    async fn wait_for_sync(&self) -> Result<()> {
        self.services
            .wait_until_ready()
            .await
            .map_err(|e| MirrorError::CacheSyncFailed(format!("local services: {}", e)))?;
        self.nodes
            .wait_until_ready()
            .await
            .map_err(|e| MirrorError::CacheSyncFailed(format!("remote nodes: {}", e)))?;

        info!(
            "Managing endpoints for {} services, {} remote nodes known",
            self.services.state().len(),
            self.nodes.state().len()
        );
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn reconcile(&self, key: &ResourceKey) -> Result<ActionType> {
        let Some(service) = self.services.get(&key.object_ref()) else {
            info!("Service {} in work queue no longer exists", key);
            return Ok(ActionType::None);
        };

        let nodes = self.nodes.state();
        let desired = new_endpoints(&service, &nodes, self.ownership.labels())?;

        let endpoints: Api<Endpoints> = Api::namespaced(self.client.clone(), &key.namespace);
        match endpoints.get_opt(&key.name).await? {
            None => {
                info!("Creating new endpoints {}", key);
                endpoints.create(&PostParams::default(), &desired).await?;
                Ok(ActionType::Add)
            }
            Some(mut existing) => {
                if !self.ownership.owns(&existing) {
                    warn!("Endpoints {} exist but are not managed by barrelman, skipping", key);
                    return Ok(ActionType::None);
                }

                info!("Updating endpoints for {}", key);
                existing.subsets = desired.subsets;
                endpoints
                    .replace(&key.name, &PostParams::default(), &existing)
                    .await?;
                Ok(ActionType::Update)
            }
        }
    }
}
