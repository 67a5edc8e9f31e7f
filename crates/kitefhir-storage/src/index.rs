//! Search index rows.
//!
//! One entry per extracted parameter value, rebuilt from resource content
//! on every create/update. The value payload reuses the typed extraction
//! output from `kitefhir-core`.

use kitefhir_core::extract::ExtractedValue;
use kitefhir_core::FhirVersion;

/// One row of the search index for a stored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Search parameter code (`family`, `birthdate`, `_id`, ...).
    pub param: String,
    pub value: ExtractedValue,
}

impl IndexEntry {
    pub fn new(param: impl Into<String>, value: ExtractedValue) -> Self {
        Self {
            param: param.into(),
            value,
        }
    }
}

/// Trait implemented by the search crate's indexer; backends and the
/// service layer only see this seam.
pub trait ResourceIndexer: Send + Sync {
    /// Produce all index entries for a resource's content.
    fn index(
        &self,
        version: FhirVersion,
        resource_type: &str,
        content: &serde_json::Value,
    ) -> Vec<IndexEntry>;
}
