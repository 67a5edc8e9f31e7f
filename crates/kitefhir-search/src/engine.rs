//! Search plan compilation.
//!
//! Validates parsed parameters against the registry and the resource's
//! allow/deny configuration, builds the typed predicate tree, and resolves
//! the control parameters (`_count`, `_offset`, `_sort`, `_total`). The
//! output is a `SearchQuery` for the storage backend plus the warnings and
//! canonical link query the HTTP layer needs.

use kitefhir_core::FhirVersion;
use kitefhir_registry::ResourceRegistry;
use kitefhir_storage::{ParamFilter, Predicate, SearchQuery, SortKey, TotalMode};
use url::form_urlencoded::byte_serialize;

use crate::error::SearchError;
use crate::parameters::{SearchParamType, SearchParameter};
use crate::parser::{ParsedParam, parse_query};
use crate::registry::SearchParameterRegistry;
use crate::types::{build_composite_predicate, build_value_test};

/// Reserved control parameters: recognized even when not registered for a
/// resource, so they never count as unknown parameters.
const RESERVED_CONTROL_PARAMS: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_include",
    "_revinclude",
    "_summary",
    "_elements",
    "_format",
    "_pretty",
    "_total",
    "_contained",
    "_containedType",
    "_id",
    "_lastUpdated",
    "_tag",
    "_profile",
    "_security",
    "_source",
    "_text",
    "_content",
    "_filter",
    "_has",
    "_list",
    "_type",
    "_query",
    "_language",
    "_in",
];

/// Controls the engine consumes itself rather than warning about.
const HANDLED_CONTROLS: &[&str] = &["_count", "_offset", "_sort", "_total"];

/// Controls silently ignored (purely presentational).
const IGNORED_CONTROLS: &[&str] = &["_format", "_pretty"];

pub fn is_reserved_control(name: &str) -> bool {
    RESERVED_CONTROL_PARAMS.contains(&name)
}

/// Engine configuration derived from server settings.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub default_count: usize,
    pub max_count: usize,
    /// Strict mode: unknown parameters fail with 400 instead of being
    /// ignored with a warning.
    pub fail_on_unknown: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            default_count: 20,
            max_count: 1000,
            fail_on_unknown: false,
        }
    }
}

/// A compiled search request.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub query: SearchQuery,
    /// Parameters ignored in lenient mode; surfaced as an
    /// OperationOutcome entry in the searchset.
    pub warnings: Vec<String>,
    /// Re-serialized non-pagination parameters for link construction.
    pub link_query: Option<String>,
}

/// Compile a raw query string into a search plan for one resource type.
pub fn build_plan(
    registry: &SearchParameterRegistry,
    resources: &ResourceRegistry,
    version: FhirVersion,
    resource_type: &str,
    raw_query: &str,
    opts: &SearchOptions,
) -> Result<SearchPlan, SearchError> {
    let parsed = parse_query(raw_query);

    let mut and_groups: Vec<Predicate> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut link_parts: Vec<String> = Vec::new();

    let mut count = opts.default_count;
    let mut offset = 0usize;
    let mut sort: Vec<SortKey> = Vec::new();
    let mut total_mode = TotalMode::Accurate;

    for param in &parsed.params {
        // Registered search parameters win over the reserved-control
        // fallback, so _id, _lastUpdated etc. flow through the typed path.
        if let Some(definition) = registry.get(version, resource_type, &param.name) {
            if !resources.is_search_param_allowed(
                resource_type,
                &param.name,
                definition.is_common(),
            ) {
                return Err(SearchError::DisallowedParameter(param.name.clone()));
            }
            if param.values.is_empty() {
                continue;
            }
            let group = build_param_group(registry, version, &definition, param)?;
            and_groups.push(group);
            link_parts.push(serialize_param(param));
            continue;
        }

        match param.name.as_str() {
            "_count" => {
                let raw = first_value(param, "_count")?;
                let n: usize = raw.parse().map_err(|_| {
                    SearchError::invalid_value("_count", "must be a positive integer")
                })?;
                if n == 0 {
                    return Err(SearchError::invalid_value("_count", "must be >= 1"));
                }
                count = n.min(opts.max_count);
            }
            "_offset" => {
                let raw = first_value(param, "_offset")?;
                offset = raw.parse().map_err(|_| {
                    SearchError::invalid_value("_offset", "must be a non-negative integer")
                })?;
            }
            "_sort" => {
                let raw = first_value(param, "_sort")?;
                for field in raw.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                    sort.push(parse_sort_field(
                        registry,
                        resources,
                        version,
                        resource_type,
                        field,
                    )?);
                }
                link_parts.push(serialize_param(param));
            }
            "_total" => {
                let raw = first_value(param, "_total")?;
                total_mode = match raw {
                    "accurate" => TotalMode::Accurate,
                    "estimate" => TotalMode::Estimate,
                    "none" => TotalMode::None,
                    other => {
                        return Err(SearchError::invalid_value(
                            "_total",
                            format!("'{other}' is not one of accurate, estimate, none"),
                        ));
                    }
                };
                link_parts.push(serialize_param(param));
            }
            name if IGNORED_CONTROLS.contains(&name) => {}
            name if is_reserved_control(name) => {
                warnings.push(format!(
                    "Search parameter '{name}' is not supported and was ignored"
                ));
            }
            name => {
                if opts.fail_on_unknown {
                    return Err(SearchError::UnknownParameter(name.to_string()));
                }
                warnings.push(format!(
                    "Unknown search parameter '{name}' was ignored"
                ));
            }
        }
    }

    let link_query = if link_parts.is_empty() {
        None
    } else {
        Some(link_parts.join("&"))
    };

    Ok(SearchPlan {
        query: SearchQuery {
            predicate: Predicate::And(and_groups),
            offset,
            count,
            sort,
            total_mode,
        },
        warnings,
        link_query,
    })
}

/// Compile one parameter occurrence: its comma-separated values OR
/// together.
fn build_param_group(
    registry: &SearchParameterRegistry,
    version: FhirVersion,
    definition: &SearchParameter,
    param: &ParsedParam,
) -> Result<Predicate, SearchError> {
    let modifier = param.resolve_modifier()?;

    let mut alternatives = Vec::with_capacity(param.values.len());
    for value in &param.values {
        let alternative = if definition.param_type == SearchParamType::Composite {
            if modifier.is_some() {
                return Err(SearchError::modifier_not_applicable(
                    &param.name,
                    param.modifier.as_deref().unwrap_or_default(),
                ));
            }
            build_composite_predicate(registry, version, definition, &value.raw)?
        } else {
            let test = build_value_test(definition, modifier.as_ref(), &value.raw)?;
            Predicate::Leaf(ParamFilter::new(&definition.code, test))
        };
        alternatives.push(alternative);
    }

    Ok(if alternatives.len() == 1 {
        alternatives.into_iter().next().expect("one alternative")
    } else {
        Predicate::Or(alternatives)
    })
}

fn first_value<'a>(param: &'a ParsedParam, name: &str) -> Result<&'a str, SearchError> {
    param
        .values
        .first()
        .map(|v| v.raw.as_str())
        .ok_or_else(|| SearchError::invalid_value(name, "missing value"))
}

/// Validate one `_sort` field against the allowlist of sortable columns:
/// the built-ins plus defined, policy-allowed parameters of indexable
/// types.
fn parse_sort_field(
    registry: &SearchParameterRegistry,
    resources: &ResourceRegistry,
    version: FhirVersion,
    resource_type: &str,
    field: &str,
) -> Result<SortKey, SearchError> {
    let (name, descending) = match field.strip_prefix('-') {
        Some(stripped) => (stripped, true),
        None => (field, false),
    };

    let sortable = match name {
        "_id" | "_lastUpdated" => true,
        other => registry
            .get(version, resource_type, other)
            .map(|def| {
                !matches!(
                    def.param_type,
                    SearchParamType::Composite | SearchParamType::Special
                ) && resources.is_search_param_allowed(resource_type, other, def.is_common())
            })
            .unwrap_or(false),
    };

    if !sortable {
        return Err(SearchError::invalid_value(
            "_sort",
            format!("unsupported sort field '{name}'"),
        ));
    }

    Ok(SortKey {
        param: name.to_string(),
        descending,
    })
}

/// Re-serialize a parameter occurrence for pagination links.
fn serialize_param(param: &ParsedParam) -> String {
    let name = match &param.modifier {
        Some(m) => format!("{}:{}", param.name, m),
        None => param.name.clone(),
    };
    let values: Vec<String> = param
        .values
        .iter()
        .map(|v| byte_serialize(v.raw.as_bytes()).collect::<String>())
        .collect();
    format!("{name}={}", values.join(","))
}
