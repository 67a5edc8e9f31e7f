//! Storage traits for the FHIR storage abstraction layer.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StorageError;
use crate::query::SearchQuery;
use crate::types::{
    HistoryPage, HistoryParams, NewResourceVersion, SearchPage, StoredResource, TenantRecord,
};

/// Operations shared between a live store and an open transaction.
///
/// The service layer writes fully-stamped versions; the backend performs
/// the atomic "mark prior rows non-current + insert new current" swap and
/// rewrites the index rows. All operations are scoped by the internal
/// tenant id.
#[async_trait]
pub trait StoreOps: Send + Sync {
    /// Reads the current version. Fails with `NotFound` when the logical
    /// resource does not exist, `Deleted` when the current row is a
    /// tombstone.
    async fn read(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, StorageError>;

    /// The highest version id of a logical resource, tombstones included.
    async fn max_version(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<i64>, StorageError>;

    /// Inserts version 1 of a new logical resource.
    ///
    /// Fails with `AlreadyExists` when a non-deleted current row exists.
    async fn create(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError>;

    /// Atomically appends a new current version.
    ///
    /// `new.version_id` must be exactly `max_version + 1` (or 1 for a
    /// first write); anything else fails with `VersionConflict`. This is
    /// the optimistic-concurrency serialization point.
    async fn put_version(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError>;

    /// Appends a tombstone row as the new current version, preserving all
    /// history. Returns the tombstone. Deleting an already-deleted
    /// resource returns the existing tombstone (idempotent).
    async fn delete(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<StoredResource, StorageError>;

    /// Evaluates a compiled search query over the current, non-deleted
    /// rows of `resource_type`.
    async fn search(
        &self,
        tenant: &str,
        resource_type: &str,
        query: &SearchQuery,
    ) -> Result<SearchPage, StorageError>;
}

/// The main storage trait all backends implement.
#[async_trait]
pub trait ResourceStore: StoreOps {
    /// Reads a specific historical version; tombstone rows are visible here.
    async fn vread(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        version_id: i64,
    ) -> Result<StoredResource, StorageError>;

    /// All versions of a logical resource, newest first.
    async fn history(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<HistoryPage, StorageError>;

    /// Begins a transaction. Writes performed through it are visible to
    /// its own reads and rolled back together on failure.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError>;

    fn supports_transactions(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

/// A transaction over the store. Consumed by `commit` or `rollback`.
#[async_trait]
pub trait StoreTransaction: StoreOps {
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Persistence for tenants, keyed by unique external UUID and unique
/// internal id.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_by_external_id(
        &self,
        external_id: Uuid,
    ) -> Result<Option<TenantRecord>, StorageError>;

    /// Inserts or replaces a tenant record.
    async fn save(&self, tenant: TenantRecord) -> Result<(), StorageError>;

    async fn list(&self) -> Result<Vec<TenantRecord>, StorageError>;
}
