//! Undo-log transactions over the in-memory store.
//!
//! Writes apply directly to the shared store, so later entries of a
//! transaction bundle observe earlier effects. The first mutation of each
//! logical resource snapshots its prior chain; rollback restores the
//! snapshots. A store-wide gate serializes transactions against each
//! other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::OwnedMutexGuard;

use kitefhir_storage::{
    NewResourceVersion, SearchPage, SearchQuery, StorageError, StoreOps, StoreTransaction,
    StoredResource,
};

use crate::storage::{Inner, ResourceChain, ResourceKey};

pub(crate) struct MemoryTransaction {
    inner: Arc<Inner>,
    undo: Mutex<HashMap<(String, ResourceKey), Option<ResourceChain>>>,
    _gate: OwnedMutexGuard<()>,
}

impl MemoryTransaction {
    pub(crate) fn new(inner: Arc<Inner>, gate: OwnedMutexGuard<()>) -> Self {
        Self {
            inner,
            undo: Mutex::new(HashMap::new()),
            _gate: gate,
        }
    }

    /// Record the pre-transaction state of a resource once.
    fn remember(&self, tenant: &str, resource_type: &str, id: &str) {
        let key = (
            tenant.to_string(),
            (resource_type.to_string(), id.to_string()),
        );
        let mut undo = self.undo.lock();
        if !undo.contains_key(&key) {
            let snapshot = self.inner.snapshot(tenant, &key.1);
            undo.insert(key, snapshot);
        }
    }
}

#[async_trait]
impl StoreOps for MemoryTransaction {
    async fn read(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, StorageError> {
        self.inner.read_current(tenant, resource_type, id)
    }

    async fn max_version(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<i64>, StorageError> {
        self.inner.max_version(tenant, resource_type, id)
    }

    async fn create(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError> {
        self.remember(tenant, &new.resource_type, &new.id);
        self.inner.create(tenant, new)
    }

    async fn put_version(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError> {
        self.remember(tenant, &new.resource_type, &new.id);
        self.inner.put_version(tenant, new)
    }

    async fn delete(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<StoredResource, StorageError> {
        self.remember(tenant, resource_type, id);
        self.inner.delete(tenant, resource_type, id, at)
    }

    async fn search(
        &self,
        tenant: &str,
        resource_type: &str,
        query: &SearchQuery,
    ) -> Result<SearchPage, StorageError> {
        self.inner.search(tenant, resource_type, query)
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        // writes already applied; dropping the undo log makes them final
        self.undo.lock().clear();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let undo = std::mem::take(&mut *self.undo.lock());
        for ((tenant, key), prior) in undo {
            self.inner.restore(&tenant, key, prior);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use kitefhir_core::FhirVersion;
    use kitefhir_storage::ResourceStore;
    use serde_json::json;

    fn version(id: &str, version_id: i64) -> NewResourceVersion {
        NewResourceVersion {
            resource_type: "Patient".into(),
            id: id.into(),
            version_id,
            fhir_version: FhirVersion::R5,
            content: json!({ "resourceType": "Patient", "id": id }),
            last_updated: OffsetDateTime::now_utc(),
            index: Vec::new(),
        }
    }

    #[tokio::test]
    async fn commit_keeps_writes() {
        let store = MemoryStore::new();
        let txn = store.begin().await.unwrap();
        txn.create("t1", version("p1", 1)).await.unwrap();
        txn.commit().await.unwrap();

        assert!(store.read("t1", "Patient", "p1").await.is_ok());
    }

    #[tokio::test]
    async fn rollback_undoes_creates() {
        let store = MemoryStore::new();
        let txn = store.begin().await.unwrap();
        txn.create("t1", version("p1", 1)).await.unwrap();
        txn.create("t1", version("p2", 1)).await.unwrap();
        txn.rollback().await.unwrap();

        assert!(store.read("t1", "Patient", "p1").await.is_err());
        assert!(store.read("t1", "Patient", "p2").await.is_err());
    }

    #[tokio::test]
    async fn rollback_restores_prior_versions() {
        let store = MemoryStore::new();
        store.create("t1", version("p1", 1)).await.unwrap();

        let txn = store.begin().await.unwrap();
        txn.put_version("t1", version("p1", 2)).await.unwrap();
        txn.delete("t1", "Patient", "p2", OffsetDateTime::now_utc())
            .await
            .ok();
        txn.rollback().await.unwrap();

        let read = store.read("t1", "Patient", "p1").await.unwrap();
        assert_eq!(read.version_id, 1);
    }

    #[tokio::test]
    async fn writes_visible_within_transaction() {
        let store = MemoryStore::new();
        let txn = store.begin().await.unwrap();
        txn.create("t1", version("p1", 1)).await.unwrap();
        // later entries in the same bundle see the earlier create
        let read = txn.read("t1", "Patient", "p1").await.unwrap();
        assert_eq!(read.version_id, 1);
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn failed_entry_then_rollback_has_no_side_effects() {
        let store = MemoryStore::new();
        store.create("t1", version("existing", 1)).await.unwrap();

        let txn = store.begin().await.unwrap();
        txn.create("t1", version("p1", 1)).await.unwrap();
        // stale version forces a conflict
        let err = txn.put_version("t1", version("existing", 9)).await.unwrap_err();
        assert!(matches!(err, StorageError::VersionConflict { .. }));
        txn.rollback().await.unwrap();

        assert!(store.read("t1", "Patient", "p1").await.is_err());
        let existing = store.read("t1", "Patient", "existing").await.unwrap();
        assert_eq!(existing.version_id, 1);
    }

    #[tokio::test]
    async fn transactions_are_serialized() {
        let store = MemoryStore::new();
        let txn = store.begin().await.unwrap();

        // a second begin() waits for the first to finish
        let store2 = store.clone();
        let pending = tokio::spawn(async move {
            let txn2 = store2.begin().await.unwrap();
            txn2.commit().await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        txn.commit().await.unwrap();
        pending.await.unwrap();
    }
}
