//! Aligns persisted container records with what a host actually runs.
//!
//! Matching is by short engine id. Matched rows get `status`, `ports` and
//! `image` refreshed; unmatched remote containers are inserted as active rows.
//! Rows with no remote counterpart are never touched: deletion only happens
//! through an explicit remove.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::db::entities::container;
use crate::db::services::{ContainerChanges, ContainerStore, NewContainer, StoreError};
use crate::docker::parser::RemoteContainer;

pub const SHORT_ID_LEN: usize = 12;

/// The 12 character form of an engine id used for correlation.
pub fn short_id(engine_id: &str) -> String {
    engine_id.chars().take(SHORT_ID_LEN).collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

fn empty_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn changes_for(record: &container::Model, remote: &RemoteContainer) -> ContainerChanges {
    // An empty remote state carries no information; keep what is stored.
    let status = empty_to_none(&remote.state).filter(|s| record.status.as_ref() != Some(s));
    let image = Some(remote.image.clone()).filter(|i| &record.image != i);
    let ports = empty_to_none(&remote.ports);
    let ports = (record.ports != ports).then_some(ports);
    ContainerChanges {
        status,
        image,
        ports,
        is_active: None,
    }
}

/// Runs one reconciliation pass for `server_id` against `snapshot`.
///
/// A store failure aborts the pass and is returned; a uniqueness conflict on a
/// single insert only skips that entry.
pub async fn reconcile<I>(
    store: &dyn ContainerStore,
    server_id: i32,
    snapshot: I,
) -> Result<SyncReport, StoreError>
where
    I: IntoIterator<Item = RemoteContainer>,
{
    let mut report = SyncReport::default();

    let mut by_docker_id: HashMap<String, container::Model> = store
        .get_all_by_server(server_id)
        .await?
        .into_iter()
        .filter_map(|record| record.docker_id.clone().map(|id| (id, record)))
        .collect();

    for remote in snapshot {
        if remote.engine_id.is_empty() {
            debug!(server_id, name = %remote.name, "Remote container has no engine id, skipping.");
            report.skipped += 1;
            continue;
        }
        let docker_id = short_id(&remote.engine_id);

        if let Some(record) = by_docker_id.get(&docker_id) {
            let changes = changes_for(record, &remote);
            if changes.is_empty() {
                report.unchanged += 1;
                continue;
            }
            if let Some(updated) = store.update(record.id, changes).await? {
                by_docker_id.insert(docker_id, updated);
                report.updated += 1;
            }
            continue;
        }

        let new = NewContainer {
            server_id,
            name: remote.name.clone(),
            docker_id: Some(docker_id.clone()),
            status: empty_to_none(&remote.state),
            image: remote.image.clone(),
            ports: empty_to_none(&remote.ports),
            is_active: true,
        };
        match store.create(new).await {
            Ok(created) => {
                by_docker_id.insert(docker_id, created);
                report.created += 1;
            }
            Err(e @ StoreError::UniqueViolation { .. }) => {
                warn!(server_id, docker_id = %docker_id, name = %remote.name, error = %e, "Remote container conflicts with an existing record, skipping.");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_store::MemoryContainerStore;

    fn remote(engine_id: &str, name: &str, state: &str, image: &str, ports: &str) -> RemoteContainer {
        RemoteContainer {
            engine_id: engine_id.to_string(),
            name: name.to_string(),
            state: state.to_string(),
            image: image.to_string(),
            ports: ports.to_string(),
        }
    }

    fn seeded(store: &MemoryContainerStore, docker_id: &str, name: &str, is_active: bool) -> container::Model {
        store.seed(NewContainer {
            server_id: 1,
            name: name.to_string(),
            docker_id: Some(docker_id.to_string()),
            status: Some("running".to_string()),
            image: "nginx:1.25".to_string(),
            ports: Some("0.0.0.0:80->80/tcp".to_string()),
            is_active,
        })
    }

    #[test]
    fn test_short_id_truncates() {
        assert_eq!(
            short_id("3f4e8a1b2c9d7e6f5a4b3c2d1e0f9a8b7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f"),
            "3f4e8a1b2c9d"
        );
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn test_matched_record_updates_only_mutable_fields() {
        let store = MemoryContainerStore::new();
        let before = seeded(&store, "3f4e8a1b2c9d", "web", false);

        let snapshot = vec![remote(
            "3f4e8a1b2c9d7e6f5a4b",
            "renamed-remotely",
            "exited",
            "nginx:1.27",
            "",
        )];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
        let after = store.all_rows().remove(0);
        assert_eq!(after.status.as_deref(), Some("exited"));
        assert_eq!(after.image, "nginx:1.27");
        assert_eq!(after.ports, None);
        assert_eq!(after.name, before.name);
        assert_eq!(after.docker_id, before.docker_id);
        assert_eq!(after.is_active, before.is_active);
        assert_eq!(after.server_id, before.server_id);
    }

    #[tokio::test]
    async fn test_empty_remote_state_is_never_written() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);

        let snapshot = vec![
            remote("3f4e8a1b2c9d", "web", "", "nginx:1.25", "0.0.0.0:80->80/tcp"),
            remote("9a8b7c6d5e4f", "db", "  ", "postgres:16", ""),
        ];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.created, 1);
        let rows = store.all_rows();
        assert_eq!(rows[0].status.as_deref(), Some("running"));
        assert_eq!(rows[1].status, None);
    }

    #[tokio::test]
    async fn test_unmatched_remote_inserts_one_active_record() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);

        let snapshot = vec![remote("9a8b7c6d5e4f3a2b", "db", "running", "postgres:16", "5432/tcp")];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.created, 1);
        let rows = store.all_rows();
        assert_eq!(rows.len(), 2);
        let created = &rows[1];
        assert_eq!(created.docker_id.as_deref(), Some("9a8b7c6d5e4f"));
        assert_eq!(created.name, "db");
        assert!(created.is_active);
        assert_eq!(created.status.as_deref(), Some("running"));
        assert_eq!(created.ports.as_deref(), Some("5432/tcp"));
    }

    #[tokio::test]
    async fn test_absent_remote_never_deletes() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);
        seeded(&store, "9a8b7c6d5e4f", "db", true);

        let report = reconcile(&store, 1, Vec::new()).await.unwrap();

        assert_eq!(report, SyncReport::default());
        assert!(store.all_rows().iter().all(|r| !r.deleted));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_entry_without_engine_id_is_skipped() {
        let store = MemoryContainerStore::new();

        let snapshot = vec![
            remote("", "orphan", "created", "busybox", ""),
            remote("abcdefabcdef99", "kept", "running", "busybox", ""),
        ];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert_eq!(store.all_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_record_is_not_rewritten() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);

        let snapshot = vec![remote("3f4e8a1b2c9d", "web", "running", "nginx:1.25", "0.0.0.0:80->80/tcp")];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_pass_converges() {
        let store = MemoryContainerStore::new();
        let snapshot = || vec![remote("9a8b7c6d5e4f3a2b", "db", "running", "postgres:16", "")];

        reconcile(&store, 1, snapshot()).await.unwrap();
        let second = reconcile(&store, 1, snapshot()).await.unwrap();

        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(store.all_rows().len(), 1);
    }

    #[tokio::test]
    async fn test_name_conflict_skips_entry_and_continues() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);

        // Same name, different engine id: the container was recreated outside this system.
        let snapshot = vec![
            remote("111111111111", "web", "running", "nginx:1.25", ""),
            remote("222222222222", "cache", "running", "redis:7", ""),
        ];
        let report = reconcile(&store, 1, snapshot).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
    }

    #[tokio::test]
    async fn test_other_servers_are_not_matched() {
        let store = MemoryContainerStore::new();
        seeded(&store, "3f4e8a1b2c9d", "web", true);

        let snapshot = vec![remote("3f4e8a1b2c9d", "web", "running", "nginx:1.25", "")];
        let report = reconcile(&store, 2, snapshot).await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(store.all_rows()[1].server_id, 2);
    }
}
