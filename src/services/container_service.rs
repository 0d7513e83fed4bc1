//! Container lifecycle on managed servers.
//!
//! Mutations follow one order: remote `docker` command first, then the
//! persisted record, then an unconditional eviction of the server's cached
//! listing. Reads go through the listing cache and reconcile on a miss.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::cache::ContainerListingCache;
use crate::db::entities::{container, server};
use crate::db::services::{ContainerChanges, ContainerStore, NewContainer, StoreError};
use crate::docker::{ContainerAction, DockerClient, RunSpec, SyncReport, parse_ps_output, reconcile};
use crate::services::encryption_service::{CryptoError, SecretBox};
use crate::ssh::{RemoteError, SshTarget};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Container not found.")]
    NotFound,
    #[error("{0}")]
    InvalidInput(String),
    #[error("Server credentials are unusable: {0}")]
    Credentials(#[from] CryptoError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The remote create succeeded but the record could not be written.
    #[error("Database write failed ({source}); {compensation}")]
    RolledBack {
        source: StoreError,
        compensation: String,
    },
}

pub struct ContainerService {
    store: Arc<dyn ContainerStore>,
    docker: DockerClient,
    cache: ContainerListingCache,
    secrets: SecretBox,
}

impl ContainerService {
    pub fn new(
        store: Arc<dyn ContainerStore>,
        docker: DockerClient,
        cache: ContainerListingCache,
        secrets: SecretBox,
    ) -> Self {
        Self {
            store,
            docker,
            cache,
            secrets,
        }
    }

    pub fn cache(&self) -> &ContainerListingCache {
        &self.cache
    }

    /// Connection parameters for `server` with its key decrypted.
    pub fn target_for(&self, server: &server::Model) -> Result<SshTarget, ContainerError> {
        let port = u16::try_from(server.port)
            .map_err(|_| ContainerError::InvalidInput(format!("Invalid SSH port: {}", server.port)))?;
        Ok(SshTarget {
            host: server.host.clone(),
            port,
            username: server.ssh_user.clone(),
            private_key: self.secrets.open(&server.ssh_private_key)?,
        })
    }

    /// One reconciliation pass against the host's current `docker ps -a`.
    pub async fn sync(&self, server: &server::Model) -> Result<SyncReport, ContainerError> {
        let target = self.target_for(server)?;
        let raw = self.docker.list_all(&target).await?;
        let report = reconcile(self.store.as_ref(), server.id, parse_ps_output(&raw)).await?;
        info!(
            server_id = server.id,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            "Container reconciliation finished."
        );
        Ok(report)
    }

    /// Explicit resync: evicts the listing, then runs a pass. The next list
    /// repopulates the cache lazily.
    pub async fn resync(&self, server: &server::Model) -> Result<SyncReport, ContainerError> {
        self.cache.invalidate(server.id).await;
        let result = self.sync(server).await;
        self.cache.invalidate(server.id).await;
        result
    }

    /// Read-through listing. On a miss the host is reconciled first; if that
    /// fails the persisted records are returned as they are and nothing is
    /// cached, so the next call tries the host again.
    pub async fn list(&self, server: &server::Model) -> Result<Vec<container::Model>, ContainerError> {
        if let Some(listing) = self.cache.get(server.id).await {
            return Ok(listing);
        }

        // Read before touching the host so a mutation finishing mid-load is seen.
        let generation = self.cache.generation(server.id).await;
        let reconciled = match self.sync(server).await {
            Ok(_) => true,
            Err(e) => {
                warn!(server_id = server.id, error = %e, "Reconciliation failed, serving persisted state.");
                false
            }
        };

        let listing = self.store.get_all_by_server(server.id).await?;
        if let (true, Some(generation)) = (reconciled, generation) {
            self.cache.put(server.id, generation, &listing).await;
        }
        Ok(listing)
    }

    /// Persisted state only; does not contact the host.
    pub async fn get(&self, server_id: i32, container_id: i32) -> Result<container::Model, ContainerError> {
        self.store
            .get_by_id(container_id)
            .await?
            .filter(|record| record.server_id == server_id)
            .ok_or(ContainerError::NotFound)
    }

    pub async fn create(&self, server: &server::Model, spec: RunSpec) -> Result<container::Model, ContainerError> {
        let result = self.create_inner(server, spec).await;
        self.cache.invalidate(server.id).await;
        result
    }

    async fn create_inner(&self, server: &server::Model, spec: RunSpec) -> Result<container::Model, ContainerError> {
        let name = spec.name.trim().to_string();
        if name.is_empty() || spec.image.trim().is_empty() {
            return Err(ContainerError::InvalidInput(
                "Container name and image are required.".to_string(),
            ));
        }
        // Fail before any remote side effect when the name is already taken.
        if self.store.find_by_name(server.id, &name).await?.is_some() {
            return Err(StoreError::unique(&["server_id", "name"]).into());
        }

        let target = self.target_for(server)?;
        let spec = RunSpec { name, ..spec };
        let docker_id = self.docker.create(&target, &spec).await?;
        if docker_id.is_empty() {
            return Err(ContainerError::InvalidInput(
                "docker run returned no container id.".to_string(),
            ));
        }

        let new = NewContainer {
            server_id: server.id,
            name: spec.name.clone(),
            docker_id: Some(docker_id.clone()),
            status: Some("running".to_string()),
            image: spec.image.clone(),
            ports: spec.ports.clone().filter(|p| !p.trim().is_empty()),
            is_active: true,
        };

        match self.store.create(new).await {
            Ok(record) => {
                info!(server_id = server.id, container_id = record.id, docker_id = %docker_id, "Container created.");
                Ok(record)
            }
            Err(source) => {
                let compensation = match self.docker.force_remove(&target, &docker_id).await {
                    Ok(()) => format!("removed remote container {docker_id}"),
                    Err(e) => format!("failed to remove remote container {docker_id}: {e}"),
                };
                error!(
                    server_id = server.id,
                    docker_id = %docker_id,
                    error = %source,
                    compensation = %compensation,
                    "Container record write failed after remote create."
                );
                Err(ContainerError::RolledBack {
                    source,
                    compensation,
                })
            }
        }
    }

    pub async fn set_active(
        &self,
        server_id: i32,
        container_id: i32,
        is_active: bool,
    ) -> Result<container::Model, ContainerError> {
        let result = self.set_active_inner(server_id, container_id, is_active).await;
        self.cache.invalidate(server_id).await;
        result
    }

    async fn set_active_inner(
        &self,
        server_id: i32,
        container_id: i32,
        is_active: bool,
    ) -> Result<container::Model, ContainerError> {
        self.get(server_id, container_id).await?;
        let changes = ContainerChanges {
            is_active: Some(is_active),
            ..Default::default()
        };
        self.store
            .update(container_id, changes)
            .await?
            .ok_or(ContainerError::NotFound)
    }

    /// Removes the container from the host (tolerating one that is already
    /// stopped), then soft-deletes the record.
    pub async fn remove(&self, server: &server::Model, container_id: i32) -> Result<container::Model, ContainerError> {
        let result = self.remove_inner(server, container_id).await;
        self.cache.invalidate(server.id).await;
        result
    }

    async fn remove_inner(&self, server: &server::Model, container_id: i32) -> Result<container::Model, ContainerError> {
        let record = self.get(server.id, container_id).await?;
        if let Some(docker_id) = &record.docker_id {
            let target = self.target_for(server)?;
            self.docker.remove(&target, docker_id).await?;
        }
        let removed = self
            .store
            .soft_delete(record.id)
            .await?
            .ok_or(ContainerError::NotFound)?;
        info!(server_id = server.id, container_id, "Container removed.");
        Ok(removed)
    }

    pub async fn control(
        &self,
        server: &server::Model,
        container_id: i32,
        action: ContainerAction,
    ) -> Result<container::Model, ContainerError> {
        let result = self.control_inner(server, container_id, action).await;
        self.cache.invalidate(server.id).await;
        result
    }

    async fn control_inner(
        &self,
        server: &server::Model,
        container_id: i32,
        action: ContainerAction,
    ) -> Result<container::Model, ContainerError> {
        let record = self.get(server.id, container_id).await?;
        let docker_id = record.docker_id.as_deref().ok_or_else(|| {
            ContainerError::InvalidInput("Container has no engine id yet.".to_string())
        })?;
        let target = self.target_for(server)?;
        self.docker.control(&target, action, docker_id).await?;

        let changes = ContainerChanges {
            status: Some(action.resulting_status().to_string()),
            ..Default::default()
        };
        let updated = self
            .store
            .update(record.id, changes)
            .await?
            .ok_or(ContainerError::NotFound)?;
        info!(server_id = server.id, container_id, action = %action, "Container action applied.");
        Ok(updated)
    }
}
