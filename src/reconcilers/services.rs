// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service mirror: keeps a local shadow service for every remote NodePort service.

use crate::constants::controllers;
use crate::controllers::Reconcile;
use crate::error::{MirrorError, Result};
use crate::kubernetes::ensure_namespace_exists;
use crate::types::service::{dummy_service_ports, service_ports_equal};
use crate::types::{
    ActionType, OwnershipPredicate, ResourceKey, ResponsibilityPredicate, ServiceType,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use kube::api::{DeleteParams, ObjectMeta, PostParams};
use kube::runtime::reflector::Store;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, instrument, warn};

fn describe(service: &Service) -> String {
    format!("{}/{}", service.namespace().unwrap_or_default(), service.name_any())
}

/// Decide what to do with the local copy of a service.
///
/// Ownership is always checked before a write is chosen, and an absent or
/// unqualified remote service only ever leads to deleting an owned local copy.
pub fn local_action(
    remote: Option<&Service>,
    local: Option<&Service>,
    responsibility: &ResponsibilityPredicate,
    ownership: &OwnershipPredicate,
) -> ActionType {
    let remote = remote.filter(|svc| responsibility.is_responsible(svc));

    match (remote, local) {
        (Some(remote), Some(local)) => {
            debug!("{} responsible for remote", describe(remote));
            if !ownership.owns(local) {
                warn!("{} we don't own this service, SKIP", describe(local));
                return ActionType::None;
            }
            if !responsibility.is_eligible(local) {
                warn!("{} not responsible for local service, SKIP", describe(local));
                return ActionType::None;
            }
            info!("{} remote and local exist, UPDATE", describe(local));
            ActionType::Update
        }
        (Some(remote), None) => {
            info!("{} local does not exist, ADD", describe(remote));
            ActionType::Add
        }
        (None, Some(local)) => {
            if !ownership.owns(local) {
                warn!("{} we don't own this service, SKIP", describe(local));
                return ActionType::None;
            }
            info!("{} not responsible for remote, DELETE", describe(local));
            ActionType::Delete
        }
        (None, None) => ActionType::None,
    }
}

pub struct ServiceMirror {
    /// Local cluster client
    client: Client,
    remote_services: Store<Service>,
    responsibility: ResponsibilityPredicate,
    ownership: OwnershipPredicate,
    /// Type of the services created locally
    local_type: ServiceType,
}

impl ServiceMirror {
    pub fn new(
        client: Client,
        remote_services: Store<Service>,
        responsibility: ResponsibilityPredicate,
        ownership: OwnershipPredicate,
        local_type: ServiceType,
    ) -> Self {
        Self {
            client,
            remote_services,
            responsibility,
            ownership,
            local_type,
        }
    }

    async fn add(
        &self,
        services: &Api<Service>,
        key: &ResourceKey,
        remote: &Service,
    ) -> Result<()> {
        let ports = dummy_service_ports(remote, self.local_type)?;
        ensure_namespace_exists(&self.client, &key.namespace).await?;

        let service = Service {
            metadata: ObjectMeta {
                name: Some(key.name.clone()),
                namespace: Some(key.namespace.clone()),
                labels: Some(self.ownership.labels()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some(self.local_type.to_string()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        };

        services.create(&PostParams::default(), &service).await?;
        info!("Created local service {}", key);
        Ok(())
    }

    /// Rewrites ports and type when the ports drifted; `None` when nothing was written
    async fn update(
        &self,
        services: &Api<Service>,
        key: &ResourceKey,
        remote: &Service,
        mut local: Service,
    ) -> Result<ActionType> {
        let ports = dummy_service_ports(remote, self.local_type)?;
        let current = local
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_deref())
            .unwrap_or_default();

        if service_ports_equal(&ports, current) {
            debug!("Ports of {} unchanged, nothing to update", key);
            return Ok(ActionType::None);
        }

        let spec = local.spec.get_or_insert_with(ServiceSpec::default);
        spec.ports = Some(ports);
        spec.type_ = Some(self.local_type.to_string());

        services.replace(&key.name, &PostParams::default(), &local).await?;
        info!("Updated local service {}", key);
        Ok(ActionType::Update)
    }

    async fn delete(&self, services: &Api<Service>, key: &ResourceKey) -> Result<()> {
        match services.delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => {
                info!("Deleted local service {}", key);
                Ok(())
            }
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("Local service {} already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Reconcile for ServiceMirror {
    fn name(&self) -> &'static str {
        controllers::SERVICES
    }

    async fn wait_for_sync(&self) -> Result<()> {
        self.remote_services
            .wait_until_ready()
            .await
            .map_err(|e| MirrorError::CacheSyncFailed(format!("remote services: {}", e)))?;

        let responsible = self
            .remote_services
            .state()
            .iter()
            .filter(|svc| self.responsibility.is_responsible(svc))
            .count();
        info!("Mirroring {} remote services", responsible);
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn reconcile(&self, key: &ResourceKey) -> Result<ActionType> {
        let remote = self.remote_services.get(&key.object_ref());
        let services: Api<Service> = Api::namespaced(self.client.clone(), &key.namespace);
        let local = services.get_opt(&key.name).await?;

        let action = local_action(
            remote.as_deref(),
            local.as_ref(),
            &self.responsibility,
            &self.ownership,
        );

        match (action, remote.as_deref(), local) {
            (ActionType::Add, Some(remote), _) => {
                self.add(&services, key, remote)
                    .await
                    .map_err(MirrorError::during(ActionType::Add))?;
                Ok(ActionType::Add)
            }
            (ActionType::Update, Some(remote), Some(local)) => self
                .update(&services, key, remote, local)
                .await
                .map_err(MirrorError::during(ActionType::Update)),
            (ActionType::Delete, _, Some(_)) => {
                self.delete(&services, key)
                    .await
                    .map_err(MirrorError::during(ActionType::Delete))?;
                Ok(ActionType::Delete)
            }
            _ => Ok(ActionType::None),
        }
    }
}
