//! Row shapes shared between storage backends and the service layer.

use kitefhir_core::FhirVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::index::IndexEntry;

/// One version row of a FHIR resource as held by a storage backend.
///
/// At most one row per `(tenant, type, id)` is current; the tombstone row
/// written by a delete is the current row with `is_deleted = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    pub resource_type: String,
    pub id: String,
    /// Monotonic version id, `1..n` with no gaps.
    pub version_id: i64,
    pub fhir_version: FhirVersion,
    /// The full resource content as JSON (already meta-stamped).
    pub content: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub is_deleted: bool,
}

impl StoredResource {
    /// Weak ETag value for this version (`W/"<versionId>"`).
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version_id)
    }

    /// `Type/id/_history/versionId`, the Location value for writes.
    pub fn location(&self) -> String {
        format!(
            "{}/{}/_history/{}",
            self.resource_type, self.id, self.version_id
        )
    }
}

/// A fully-stamped new version handed to the backend for persistence.
///
/// The service layer assigns id, version and meta before calling the store;
/// the backend's job is the atomic swap and the index rewrite.
#[derive(Debug, Clone)]
pub struct NewResourceVersion {
    pub resource_type: String,
    pub id: String,
    pub version_id: i64,
    pub fhir_version: FhirVersion,
    pub content: Value,
    pub last_updated: OffsetDateTime,
    pub index: Vec<IndexEntry>,
}

/// The operation that produced a history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMethod {
    Create,
    Update,
    Delete,
}

impl HistoryMethod {
    pub fn http_method(&self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HistoryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.http_method())
    }
}

/// Parameters for a history query.
#[derive(Debug, Clone, Default)]
pub struct HistoryParams {
    pub count: Option<usize>,
    pub offset: Option<usize>,
    pub since: Option<OffsetDateTime>,
}

/// Result of a history query, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub entries: Vec<(StoredResource, HistoryMethod)>,
    pub total: usize,
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub resources: Vec<StoredResource>,
    /// Total match count; `None` when the query asked for `_total=none`.
    pub total: Option<usize>,
}

/// How to calculate the total count in search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalMode {
    #[default]
    Accurate,
    Estimate,
    None,
}

/// A persisted tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    /// External UUID presented in the tenant header.
    pub external_id: uuid::Uuid,
    /// Short internal id used in storage rows.
    pub internal_id: String,
    pub name: Option<String>,
    pub enabled: bool,
}

impl TenantRecord {
    pub fn new(external_id: uuid::Uuid, internal_id: impl Into<String>) -> Self {
        Self {
            external_id,
            internal_id: internal_id.into(),
            name: None,
            enabled: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
