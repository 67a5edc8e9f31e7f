//! The in-memory resource store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use time::OffsetDateTime;

use kitefhir_core::FhirVersion;
use kitefhir_storage::{
    HistoryMethod, HistoryPage, HistoryParams, IndexEntry, NewResourceVersion, ResourceStore,
    SearchPage, SearchQuery, SortKey, StorageError, StoreOps, StoreTransaction, StoredResource,
    TotalMode,
};

use crate::eval::{SortValue, eval_predicate, sort_value};
use crate::transaction::MemoryTransaction;

pub(crate) type ResourceKey = (String, String); // (resource_type, id)

/// All versions of one logical resource. The last row is the current one,
/// so "at most one current row" holds by construction.
#[derive(Debug, Clone)]
pub(crate) struct ResourceChain {
    pub(crate) created_at: OffsetDateTime,
    pub(crate) versions: Vec<VersionRow>,
    /// Index rows for the current version; cleared on delete.
    pub(crate) index: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
pub(crate) struct VersionRow {
    pub(crate) version_id: i64,
    pub(crate) fhir_version: FhirVersion,
    pub(crate) content: serde_json::Value,
    pub(crate) last_updated: OffsetDateTime,
    pub(crate) is_deleted: bool,
    pub(crate) method: HistoryMethod,
}

impl ResourceChain {
    fn current(&self) -> &VersionRow {
        self.versions.last().expect("chain never empty")
    }

    fn max_version(&self) -> i64 {
        self.current().version_id
    }

    fn to_stored(&self, row: &VersionRow, key: &ResourceKey) -> StoredResource {
        StoredResource {
            resource_type: key.0.clone(),
            id: key.1.clone(),
            version_id: row.version_id,
            fhir_version: row.fhir_version,
            content: row.content.clone(),
            last_updated: row.last_updated,
            created_at: self.created_at,
            is_deleted: row.is_deleted,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Inner {
    /// tenant internal id -> resource chains
    pub(crate) data: RwLock<HashMap<String, HashMap<ResourceKey, ResourceChain>>>,
}

impl Inner {
    pub(crate) fn read_current(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, StorageError> {
        let data = self.data.read();
        let key = (resource_type.to_string(), id.to_string());
        let chain = data
            .get(tenant)
            .and_then(|t| t.get(&key))
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;
        let current = chain.current();
        if current.is_deleted {
            return Err(StorageError::deleted(resource_type, id));
        }
        Ok(chain.to_stored(current, &key))
    }

    pub(crate) fn max_version(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
    ) -> Result<Option<i64>, StorageError> {
        let data = self.data.read();
        let key = (resource_type.to_string(), id.to_string());
        Ok(data
            .get(tenant)
            .and_then(|t| t.get(&key))
            .map(ResourceChain::max_version))
    }

    pub(crate) fn create(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError> {
        let mut data = self.data.write();
        let tenant_data = data.entry(tenant.to_string()).or_default();
        let key = (new.resource_type.clone(), new.id.clone());

        if tenant_data.contains_key(&key) {
            return Err(StorageError::already_exists(&new.resource_type, &new.id));
        }

        let chain = ResourceChain {
            created_at: new.last_updated,
            versions: vec![VersionRow {
                version_id: new.version_id,
                fhir_version: new.fhir_version,
                content: new.content,
                last_updated: new.last_updated,
                is_deleted: false,
                method: HistoryMethod::Create,
            }],
            index: new.index,
        };
        let stored = chain.to_stored(chain.current(), &key);
        tenant_data.insert(key, chain);
        Ok(stored)
    }

    pub(crate) fn put_version(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError> {
        let mut data = self.data.write();
        let tenant_data = data.entry(tenant.to_string()).or_default();
        let key = (new.resource_type.clone(), new.id.clone());

        match tenant_data.get_mut(&key) {
            None => {
                if new.version_id != 1 {
                    return Err(StorageError::version_conflict(
                        &new.resource_type,
                        &new.id,
                        1,
                        new.version_id,
                    ));
                }
                let chain = ResourceChain {
                    created_at: new.last_updated,
                    versions: vec![VersionRow {
                        version_id: 1,
                        fhir_version: new.fhir_version,
                        content: new.content,
                        last_updated: new.last_updated,
                        is_deleted: false,
                        method: HistoryMethod::Create,
                    }],
                    index: new.index,
                };
                let stored = chain.to_stored(chain.current(), &key);
                tenant_data.insert(key, chain);
                Ok(stored)
            }
            Some(chain) => {
                let expected = chain.max_version() + 1;
                if new.version_id != expected {
                    return Err(StorageError::version_conflict(
                        &new.resource_type,
                        &new.id,
                        expected,
                        new.version_id,
                    ));
                }
                chain.versions.push(VersionRow {
                    version_id: new.version_id,
                    fhir_version: new.fhir_version,
                    content: new.content,
                    last_updated: new.last_updated,
                    is_deleted: false,
                    method: HistoryMethod::Update,
                });
                chain.index = new.index;
                Ok(chain.to_stored(chain.current(), &key))
            }
        }
    }

    pub(crate) fn delete(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<StoredResource, StorageError> {
        let mut data = self.data.write();
        let key = (resource_type.to_string(), id.to_string());
        let chain = data
            .get_mut(tenant)
            .and_then(|t| t.get_mut(&key))
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;

        // delete is idempotent: a second delete returns the tombstone
        if chain.current().is_deleted {
            return Ok(chain.to_stored(chain.current(), &key));
        }

        let fhir_version = chain.current().fhir_version;
        chain.versions.push(VersionRow {
            version_id: chain.max_version() + 1,
            fhir_version,
            content: json!({ "resourceType": resource_type, "id": id }),
            last_updated: at,
            is_deleted: true,
            method: HistoryMethod::Delete,
        });
        chain.index.clear();
        Ok(chain.to_stored(chain.current(), &key))
    }

    pub(crate) fn vread(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        version_id: i64,
    ) -> Result<StoredResource, StorageError> {
        let data = self.data.read();
        let key = (resource_type.to_string(), id.to_string());
        let chain = data
            .get(tenant)
            .and_then(|t| t.get(&key))
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;
        let row = chain
            .versions
            .iter()
            .find(|r| r.version_id == version_id)
            .ok_or_else(|| StorageError::version_not_found(resource_type, id, version_id))?;
        Ok(chain.to_stored(row, &key))
    }

    pub(crate) fn history(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<HistoryPage, StorageError> {
        let data = self.data.read();
        let key = (resource_type.to_string(), id.to_string());
        let chain = data
            .get(tenant)
            .and_then(|t| t.get(&key))
            .ok_or_else(|| StorageError::not_found(resource_type, id))?;

        let mut entries: Vec<(StoredResource, HistoryMethod)> = chain
            .versions
            .iter()
            .rev()
            .filter(|row| params.since.is_none_or(|since| row.last_updated >= since))
            .map(|row| (chain.to_stored(row, &key), row.method))
            .collect();

        let total = entries.len();
        if let Some(offset) = params.offset {
            entries = entries.into_iter().skip(offset).collect();
        }
        if let Some(count) = params.count {
            entries.truncate(count);
        }

        Ok(HistoryPage { entries, total })
    }

    pub(crate) fn search(
        &self,
        tenant: &str,
        resource_type: &str,
        query: &SearchQuery,
    ) -> Result<SearchPage, StorageError> {
        let data = self.data.read();
        let empty = HashMap::new();
        let tenant_data = data.get(tenant).unwrap_or(&empty);

        let mut matches: Vec<(&ResourceKey, &ResourceChain)> = tenant_data
            .iter()
            .filter(|(key, chain)| {
                key.0 == resource_type
                    && !chain.current().is_deleted
                    && eval_predicate(&query.predicate, &chain.index)
            })
            .collect();

        sort_matches(&mut matches, &query.sort);

        let total = match query.total_mode {
            TotalMode::None => None,
            // the in-memory backend counts exactly either way
            TotalMode::Accurate | TotalMode::Estimate => Some(matches.len()),
        };

        let resources = matches
            .into_iter()
            .skip(query.offset)
            .take(query.count)
            .map(|(key, chain)| chain.to_stored(chain.current(), key))
            .collect();

        Ok(SearchPage { resources, total })
    }

    pub(crate) fn snapshot(&self, tenant: &str, key: &ResourceKey) -> Option<ResourceChain> {
        self.data.read().get(tenant).and_then(|t| t.get(key)).cloned()
    }

    pub(crate) fn restore(&self, tenant: &str, key: ResourceKey, prior: Option<ResourceChain>) {
        let mut data = self.data.write();
        let tenant_data = data.entry(tenant.to_string()).or_default();
        match prior {
            Some(chain) => {
                tenant_data.insert(key, chain);
            }
            None => {
                tenant_data.remove(&key);
            }
        }
    }
}

/// Deterministic ordering: the requested sort keys, then
/// `(lastUpdated, id)` as the stable tie-break so pagination pages line
/// up across requests.
fn sort_matches(matches: &mut [(&ResourceKey, &ResourceChain)], sort: &[SortKey]) {
    matches.sort_by(|(a_key, a_chain), (b_key, b_chain)| {
        for key in sort {
            let ordering = match key.param.as_str() {
                "_id" => a_key.1.cmp(&b_key.1),
                "_lastUpdated" => a_chain
                    .current()
                    .last_updated
                    .cmp(&b_chain.current().last_updated),
                param => SortValue::compare(
                    &sort_value(&a_chain.index, param),
                    &sort_value(&b_chain.index, param),
                ),
            };
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        a_chain
            .current()
            .last_updated
            .cmp(&b_chain.current().last_updated)
            .then_with(|| a_key.1.cmp(&b_key.1))
    });
}

/// In-memory FHIR storage backend.
///
/// Thread-safe; clones share the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub(crate) inner: Arc<Inner>,
    pub(crate) txn_gate: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreOps for MemoryStore {
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
        self.inner.create(tenant, new)
    }

    async fn put_version(
        &self,
        tenant: &str,
        new: NewResourceVersion,
    ) -> Result<StoredResource, StorageError> {
        self.inner.put_version(tenant, new)
    }

    async fn delete(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        at: OffsetDateTime,
    ) -> Result<StoredResource, StorageError> {
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
impl ResourceStore for MemoryStore {
    async fn vread(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        version_id: i64,
    ) -> Result<StoredResource, StorageError> {
        self.inner.vread(tenant, resource_type, id, version_id)
    }

    async fn history(
        &self,
        tenant: &str,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<HistoryPage, StorageError> {
        self.inner.history(tenant, resource_type, id, params)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        // one bundle transaction at a time per store
        let gate = self.txn_gate.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction::new(self.inner.clone(), gate)))
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
