//! Tenant resolution.
//!
//! Maps the external tenant UUID presented in a request header to the
//! short internal id used in storage rows. Lookups go through an
//! in-memory TTL cache (lock-free read path via dashmap); stale reads are
//! bounded by the TTL, and the invalidation API point-deletes entries
//! after administrative tenant changes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use kitefhir_storage::TenantStore;

/// Default cache TTL: five minutes.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Errors raised while resolving a tenant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("Missing tenant header '{0}'")]
    MissingHeader(String),

    #[error("Tenant header is not a valid UUID: {0}")]
    InvalidHeader(String),

    #[error("Tenant not found: {0}")]
    NotFound(Uuid),

    #[error("Tenant disabled: {0}")]
    Disabled(Uuid),

    #[error("Tenant lookup failed: {0}")]
    Lookup(String),
}

/// The resolved tenant, carried request-scoped through the call chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub internal_id: String,
}

impl TenantContext {
    pub fn new(internal_id: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
        }
    }
}

/// Tenant resolver configuration.
#[derive(Debug, Clone)]
pub struct TenantResolverConfig {
    /// Multi-tenancy switch; when off, every request maps to the default
    /// tenant.
    pub enabled: bool,
    pub header_name: String,
    pub default_tenant_id: String,
    pub cache_ttl: Duration,
}

impl Default for TenantResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "X-Tenant-ID".to_string(),
            default_tenant_id: "default".to_string(),
            cache_ttl: Duration::seconds(DEFAULT_CACHE_TTL_SECS as i64),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    internal_id: String,
    expires_at: OffsetDateTime,
}

/// Resolves external tenant UUIDs to internal ids with a TTL cache.
pub struct TenantResolver {
    config: TenantResolverConfig,
    store: Arc<dyn TenantStore>,
    cache: DashMap<Uuid, CacheEntry>,
    ttl_secs: AtomicU64,
}

impl TenantResolver {
    pub fn new(config: TenantResolverConfig, store: Arc<dyn TenantStore>) -> Self {
        let ttl_secs = config.cache_ttl.whole_seconds().max(0) as u64;
        Self {
            config,
            store,
            cache: DashMap::new(),
            ttl_secs: AtomicU64::new(ttl_secs),
        }
    }

    pub fn header_name(&self) -> &str {
        &self.config.header_name
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Resolve the tenant for a request from its header value.
    pub async fn resolve(&self, header: Option<&str>) -> Result<TenantContext, TenantError> {
        if !self.config.enabled {
            return Ok(TenantContext::new(&self.config.default_tenant_id));
        }

        let raw = header
            .ok_or_else(|| TenantError::MissingHeader(self.config.header_name.clone()))?
            .trim();
        let external_id =
            Uuid::parse_str(raw).map_err(|_| TenantError::InvalidHeader(raw.to_string()))?;

        let now = OffsetDateTime::now_utc();
        if let Some(entry) = self.cache.get(&external_id)
            && entry.expires_at > now
        {
            return Ok(TenantContext::new(entry.internal_id.clone()));
        }

        let record = self
            .store
            .find_by_external_id(external_id)
            .await
            .map_err(|e| TenantError::Lookup(e.to_string()))?
            .ok_or(TenantError::NotFound(external_id))?;

        if !record.enabled {
            return Err(TenantError::Disabled(external_id));
        }

        let ttl = Duration::seconds(self.ttl_secs.load(Ordering::Relaxed) as i64);
        self.cache.insert(
            external_id,
            CacheEntry {
                internal_id: record.internal_id.clone(),
                expires_at: now + ttl,
            },
        );
        tracing::debug!(external_id = %external_id, internal_id = %record.internal_id, "Cached tenant mapping");

        Ok(TenantContext::new(record.internal_id))
    }

    /// Drop one cache entry; call after tenant update/disable/delete.
    pub fn invalidate(&self, external_id: Uuid) {
        self.cache.remove(&external_id);
    }

    /// Drop the whole cache.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Change the TTL for future cache inserts.
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_secs
            .store(ttl.whole_seconds().max(0) as u64, Ordering::Relaxed);
    }
}
