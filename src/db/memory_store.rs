//! In-memory `ContainerStore` for tests. Mirrors the partial unique indexes of
//! the real schema: `(server_id, name)` and `(server_id, docker_id)` are unique
//! among rows with `deleted = false`.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::db::entities::container;
use crate::db::services::{ContainerChanges, ContainerStore, NewContainer, StoreError};

#[derive(Default)]
pub struct MemoryContainerStore {
    rows: Mutex<Vec<container::Model>>,
    fail_creates: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a row directly, bypassing uniqueness checks.
    pub fn seed(&self, new: NewContainer) -> container::Model {
        let mut rows = self.rows.lock().unwrap();
        let model = Self::build(rows.len() as i32 + 1, new);
        rows.push(model.clone());
        model
    }

    /// Every row, soft-deleted ones included.
    pub fn all_rows(&self) -> Vec<container::Model> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn build(id: i32, new: NewContainer) -> container::Model {
        let now = Utc::now();
        container::Model {
            id,
            name: new.name,
            docker_id: new.docker_id,
            status: new.status,
            image: new.image,
            ports: new.ports,
            is_active: new.is_active,
            server_id: new.server_id,
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }
}

#[async_trait]
impl ContainerStore for MemoryContainerStore {
    async fn create(&self, new: NewContainer) -> Result<container::Model, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Database("insert rejected".to_string()));
        }

        let mut rows = self.rows.lock().unwrap();
        let live = rows
            .iter()
            .filter(|r| !r.deleted && r.server_id == new.server_id);
        for row in live {
            if row.name == new.name {
                return Err(StoreError::unique(&["server_id", "name"]));
            }
            if new.docker_id.is_some() && row.docker_id == new.docker_id {
                return Err(StoreError::unique(&["server_id", "docker_id"]));
            }
        }

        let model = Self::build(rows.len() as i32 + 1, new);
        rows.push(model.clone());
        Ok(model)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<container::Model>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|r| r.id == id && !r.deleted).cloned())
    }

    async fn get_all_by_server(
        &self,
        server_id: i32,
    ) -> Result<Vec<container::Model>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.server_id == server_id && !r.deleted)
            .cloned()
            .collect())
    }

    async fn find_by_name(
        &self,
        server_id: i32,
        name: &str,
    ) -> Result<Option<container::Model>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.server_id == server_id && r.name == name && !r.deleted)
            .cloned())
    }

    async fn update(
        &self,
        id: i32,
        changes: ContainerChanges,
    ) -> Result<Option<container::Model>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id && !r.deleted) else {
            return Ok(None);
        };
        if let Some(status) = changes.status {
            row.status = Some(status);
        }
        if let Some(image) = changes.image {
            row.image = image;
        }
        if let Some(ports) = changes.ports {
            row.ports = ports;
        }
        if let Some(is_active) = changes.is_active {
            row.is_active = is_active;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn soft_delete(&self, id: i32) -> Result<Option<container::Model>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id && !r.deleted) else {
            return Ok(None);
        };
        row.deleted = true;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}
