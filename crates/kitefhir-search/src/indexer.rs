//! Write-time search indexing.
//!
//! Rebuilds the index rows for a resource from its content on every
//! create/update. Only the registry's resource-type-filtered expressions
//! are evaluated, so multi-resource parameters index exactly the paths
//! belonging to the resource's own type.

use std::sync::Arc;

use serde_json::Value;

use kitefhir_core::FhirVersion;
use kitefhir_core::extract::{ExtractKind, extract_values};
use kitefhir_storage::{IndexEntry, ResourceIndexer};

use crate::parameters::SearchParamType;
use crate::registry::SearchParameterRegistry;

/// Indexer backed by the search parameter registry.
#[derive(Debug, Clone)]
pub struct SearchIndexer {
    registry: Arc<SearchParameterRegistry>,
}

impl SearchIndexer {
    pub fn new(registry: Arc<SearchParameterRegistry>) -> Self {
        Self { registry }
    }
}

impl ResourceIndexer for SearchIndexer {
    fn index(
        &self,
        version: FhirVersion,
        resource_type: &str,
        content: &Value,
    ) -> Vec<IndexEntry> {
        let mut entries = Vec::new();

        for param in self.registry.list(version, resource_type) {
            let kind = match param.param_type {
                SearchParamType::String => ExtractKind::String,
                SearchParamType::Token => ExtractKind::Token,
                SearchParamType::Date => ExtractKind::Date,
                SearchParamType::Number => ExtractKind::Number,
                SearchParamType::Quantity => ExtractKind::Quantity,
                SearchParamType::Reference => ExtractKind::Reference,
                SearchParamType::Uri => ExtractKind::Uri,
                // Composites search their component parameters' rows;
                // special parameters have no expression to index.
                SearchParamType::Composite | SearchParamType::Special => continue,
            };

            let Some(expression) =
                self.registry
                    .get_expression(version, resource_type, &param.code)
            else {
                continue;
            };

            for value in extract_values(content, resource_type, &expression, kind) {
                entries.push(IndexEntry::new(param.code.clone(), value));
            }
        }

        tracing::trace!(
            resource_type,
            count = entries.len(),
            "Rebuilt search index entries"
        );
        entries
    }
}
