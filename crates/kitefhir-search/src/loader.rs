//! SearchParameter loading from the configuration tree.
//!
//! Reads per-version directories of FHIR SearchParameter documents
//! (`<base_path>/<version>/searchparameters/*.json`) and populates a
//! `SearchParameterRegistry`. Invalid documents are skipped with a
//! warning; a missing directory for a configured version is non-fatal.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use kitefhir_core::FhirVersion;

use crate::parameters::{
    SearchModifier, SearchParamType, SearchParameter, SearchParameterComponent,
};
use crate::registry::SearchParameterRegistry;

/// Error type for search parameter loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Invalid SearchParameter: {0}")]
    InvalidSearchParameter(String),

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// Load search parameters for the given versions from the config tree.
///
/// Registers the built-in common parameters first, then everything found
/// under each version's `searchparameters` directory.
pub fn load_search_parameters(
    base_path: impl AsRef<Path>,
    versions: &[FhirVersion],
) -> Result<SearchParameterRegistry, LoaderError> {
    let mut registry = SearchParameterRegistry::new();

    for &version in versions {
        register_common_parameters(&mut registry, version);

        let dir = base_path
            .as_ref()
            .join(version.path_segment())
            .join("searchparameters");
        if !dir.is_dir() {
            tracing::warn!(
                version = %version,
                dir = %dir.display(),
                "SearchParameter directory missing, continuing with common parameters only"
            );
            continue;
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| LoaderError::Io {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut loaded = 0usize;
        let mut skipped = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| LoaderError::Io {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let text = std::fs::read_to_string(&path).map_err(|e| LoaderError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let value: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping unparseable SearchParameter file");
                    skipped += 1;
                    continue;
                }
            };
            match parse_search_parameter(&value) {
                Ok(param) => {
                    registry.register(version, param);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping invalid SearchParameter");
                    skipped += 1;
                }
            }
        }

        tracing::info!(
            version = %version,
            loaded,
            skipped,
            "Loaded search parameters"
        );
    }

    Ok(registry)
}

/// Parse a FHIR SearchParameter resource into the internal representation.
pub fn parse_search_parameter(value: &Value) -> Result<SearchParameter, LoaderError> {
    let code = value
        .get("code")
        .and_then(Value::as_str)
        .ok_or_else(|| LoaderError::InvalidSearchParameter("Missing 'code' field".into()))?
        .to_string();

    let url = value
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| LoaderError::InvalidSearchParameter("Missing 'url' field".into()))?
        .to_string();

    let param_type = value
        .get("type")
        .and_then(Value::as_str)
        .and_then(SearchParamType::parse)
        .ok_or_else(|| {
            LoaderError::InvalidSearchParameter("Invalid or missing 'type' field".into())
        })?;

    let base: Vec<String> = string_array(value, "base");
    if base.is_empty() {
        return Err(LoaderError::InvalidSearchParameter(
            "Missing or empty 'base' field".into(),
        ));
    }

    let mut param = SearchParameter::new(code, url, param_type, base);

    if let Some(expr) = value.get("expression").and_then(Value::as_str) {
        param = param.with_expression(expr);
    }

    let target = string_array(value, "target");
    if !target.is_empty() {
        param = param.with_targets(target);
    }

    let modifiers: Vec<SearchModifier> = value
        .get("modifier")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().and_then(SearchModifier::parse))
                .collect()
        })
        .unwrap_or_default();
    if !modifiers.is_empty() {
        param = param.with_modifiers(modifiers);
    }

    let comparators = string_array(value, "comparator");
    if !comparators.is_empty() {
        param = param.with_comparators(comparators);
    }

    let components: Vec<SearchParameterComponent> = value
        .get("component")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|c| {
                    Some(SearchParameterComponent {
                        definition: c.get("definition")?.as_str()?.to_string(),
                        expression: c.get("expression")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    if !components.is_empty() {
        param = param.with_components(components);
    }

    if let Some(desc) = value.get("description").and_then(Value::as_str) {
        param = param.with_description(desc);
    }

    Ok(param)
}

fn string_array(value: &Value, field: &str) -> Vec<String> {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Register the built-in common (Resource-level) search parameters.
///
/// These are defined by the FHIR specification for every resource type
/// and are registered before any package-specific parameters.
pub fn register_common_parameters(registry: &mut SearchParameterRegistry, version: FhirVersion) {
    registry.register(
        version,
        SearchParameter::new(
            "_id",
            "http://hl7.org/fhir/SearchParameter/Resource-id",
            SearchParamType::Token,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.id")
        .with_description("Logical id of this artifact"),
    );

    registry.register(
        version,
        SearchParameter::new(
            "_lastUpdated",
            "http://hl7.org/fhir/SearchParameter/Resource-lastUpdated",
            SearchParamType::Date,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.meta.lastUpdated")
        .with_description("When the resource version last changed"),
    );

    registry.register(
        version,
        SearchParameter::new(
            "_tag",
            "http://hl7.org/fhir/SearchParameter/Resource-tag",
            SearchParamType::Token,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.meta.tag")
        .with_description("Tags applied to this resource"),
    );

    registry.register(
        version,
        SearchParameter::new(
            "_profile",
            "http://hl7.org/fhir/SearchParameter/Resource-profile",
            SearchParamType::Uri,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.meta.profile")
        .with_description("Profiles this resource claims to conform to"),
    );

    registry.register(
        version,
        SearchParameter::new(
            "_security",
            "http://hl7.org/fhir/SearchParameter/Resource-security",
            SearchParamType::Token,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.meta.security")
        .with_description("Security labels applied to this resource"),
    );

    registry.register(
        version,
        SearchParameter::new(
            "_source",
            "http://hl7.org/fhir/SearchParameter/Resource-source",
            SearchParamType::Uri,
            vec!["Resource".to_string()],
        )
        .with_expression("Resource.meta.source")
        .with_description("Identifies where the resource comes from"),
    );

    tracing::debug!(version = %version, count = 6, "Registered common search parameters");
}
