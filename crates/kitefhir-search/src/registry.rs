//! Version-aware search parameter registry.
//!
//! Parameters are classified by their `base` into three buckets:
//! resource-base (applies to everything), domain-base (applies to all
//! DomainResources), and per-type. Lookup unions the buckets; abstract
//! parameters lose to a per-type definition with the same code.

use std::collections::HashMap;
use std::sync::Arc;

use kitefhir_core::FhirVersion;
use kitefhir_core::extract::expression_components;
use kitefhir_registry::ResourceRegistry;

use crate::parameters::SearchParameter;

/// Resource types that are not DomainResources: domain-base parameters do
/// not apply to them.
const NON_DOMAIN_TYPES: &[&str] = &["Binary", "Bundle", "Parameters"];

#[derive(Debug, Default)]
struct VersionBuckets {
    resource_base: HashMap<String, Arc<SearchParameter>>,
    domain_base: HashMap<String, Arc<SearchParameter>>,
    by_type: HashMap<String, HashMap<String, Arc<SearchParameter>>>,
    by_url: HashMap<String, Arc<SearchParameter>>,
}

/// Registry of search parameters per FHIR version.
///
/// Built at startup and never mutated afterwards; share behind an `Arc`.
#[derive(Debug, Default)]
pub struct SearchParameterRegistry {
    versions: HashMap<FhirVersion, VersionBuckets>,
}

impl SearchParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter under `version`, classifying it by base.
    pub fn register(&mut self, version: FhirVersion, param: SearchParameter) {
        let param = Arc::new(param);
        let buckets = self.versions.entry(version).or_default();

        buckets.by_url.insert(param.url.clone(), param.clone());

        for base in &param.base {
            match base.as_str() {
                "Resource" => {
                    buckets
                        .resource_base
                        .insert(param.code.clone(), param.clone());
                }
                "DomainResource" => {
                    buckets.domain_base.insert(param.code.clone(), param.clone());
                }
                concrete => {
                    buckets
                        .by_type
                        .entry(concrete.to_string())
                        .or_default()
                        .insert(param.code.clone(), param.clone());
                }
            }
        }
    }

    fn buckets(&self, version: FhirVersion) -> Option<&VersionBuckets> {
        self.versions.get(&version)
    }

    fn domain_applies(resource_type: &str) -> bool {
        !NON_DOMAIN_TYPES.contains(&resource_type)
    }

    /// Look up a parameter for `(version, resource_type, code)`.
    ///
    /// Per-type definitions win over domain-base, which wins over
    /// resource-base.
    pub fn get(
        &self,
        version: FhirVersion,
        resource_type: &str,
        code: &str,
    ) -> Option<Arc<SearchParameter>> {
        let buckets = self.buckets(version)?;

        if let Some(param) = buckets
            .by_type
            .get(resource_type)
            .and_then(|params| params.get(code))
        {
            return Some(param.clone());
        }
        if Self::domain_applies(resource_type)
            && let Some(param) = buckets.domain_base.get(code)
        {
            return Some(param.clone());
        }
        buckets.resource_base.get(code).cloned()
    }

    /// Look up a parameter by canonical URL (used to resolve composite
    /// components).
    pub fn get_by_url(&self, version: FhirVersion, url: &str) -> Option<Arc<SearchParameter>> {
        self.buckets(version)?.by_url.get(url).cloned()
    }

    /// All parameters applicable to `(version, resource_type)`: the union
    /// of resource-base, domain-base (where applicable) and per-type.
    pub fn list(&self, version: FhirVersion, resource_type: &str) -> Vec<Arc<SearchParameter>> {
        let Some(buckets) = self.buckets(version) else {
            return Vec::new();
        };

        let mut by_code: HashMap<&str, Arc<SearchParameter>> = HashMap::new();
        for (code, param) in &buckets.resource_base {
            by_code.insert(code, param.clone());
        }
        if Self::domain_applies(resource_type) {
            for (code, param) in &buckets.domain_base {
                by_code.insert(code, param.clone());
            }
        }
        if let Some(params) = buckets.by_type.get(resource_type) {
            for (code, param) in params {
                by_code.insert(code, param.clone());
            }
        }

        let mut params: Vec<_> = by_code.into_values().collect();
        params.sort_by(|a, b| a.code.cmp(&b.code));
        params
    }

    /// The resource-type-filtered FHIRPath expression for a parameter.
    ///
    /// Multi-resource expressions are reduced to the paths starting with
    /// `"<resource_type>."`; when none match (e.g. `Resource.id`), the
    /// original expression passes through unchanged.
    pub fn get_expression(
        &self,
        version: FhirVersion,
        resource_type: &str,
        code: &str,
    ) -> Option<String> {
        let param = self.get(version, resource_type, code)?;
        let expression = param.expression.as_deref()?;
        Some(filter_expression(expression, resource_type))
    }

    /// The parameters defined for `(version, resource_type)` that the
    /// resource's allow/deny configuration admits.
    pub fn allowed(
        &self,
        version: FhirVersion,
        resource_type: &str,
        resources: &ResourceRegistry,
    ) -> Vec<Arc<SearchParameter>> {
        self.list(version, resource_type)
            .into_iter()
            .filter(|p| {
                resources.is_search_param_allowed(resource_type, &p.code, p.is_common())
            })
            .collect()
    }

    /// Number of distinct parameters registered for `version`.
    pub fn len(&self, version: FhirVersion) -> usize {
        self.buckets(version).map(|b| b.by_url.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, version: FhirVersion) -> bool {
        self.len(version) == 0
    }
}

/// Filter a multi-resource expression down to the paths for one type.
///
/// The expression is split on `|` with surrounding whitespace tolerated.
/// If any path starts with `"<resource_type>."` the filtered join is
/// returned; otherwise the original expression is returned unchanged so
/// single-resource and abstract (`Resource.id`) definitions pass through.
pub fn filter_expression(expression: &str, resource_type: &str) -> String {
    let prefix = format!("{resource_type}.");
    let matching: Vec<&str> = expression_components(expression)
        .into_iter()
        .filter(|component| component.starts_with(&prefix))
        .collect();
    if matching.is_empty() {
        expression.to_string()
    } else {
        matching.join(" | ")
    }
}
