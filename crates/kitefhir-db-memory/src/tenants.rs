//! In-memory tenant persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use kitefhir_storage::{StorageError, TenantRecord, TenantStore};

/// Tenant table keyed by external UUID, with internal-id uniqueness
/// enforced on save.
#[derive(Debug, Default)]
pub struct MemoryTenantStore {
    tenants: RwLock<HashMap<Uuid, TenantRecord>>,
}

impl MemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for MemoryTenantStore {
    async fn find_by_external_id(
        &self,
        external_id: Uuid,
    ) -> Result<Option<TenantRecord>, StorageError> {
        Ok(self.tenants.read().get(&external_id).cloned())
    }

    async fn save(&self, tenant: TenantRecord) -> Result<(), StorageError> {
        let mut tenants = self.tenants.write();
        let internal_taken = tenants.values().any(|t| {
            t.internal_id == tenant.internal_id && t.external_id != tenant.external_id
        });
        if internal_taken {
            return Err(StorageError::backend(format!(
                "internal tenant id '{}' already in use",
                tenant.internal_id
            )));
        }
        tenants.insert(tenant.external_id, tenant);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TenantRecord>, StorageError> {
        let mut all: Vec<TenantRecord> = self.tenants.read().values().cloned().collect();
        all.sort_by(|a, b| a.internal_id.cmp(&b.internal_id));
        Ok(all)
    }
}
