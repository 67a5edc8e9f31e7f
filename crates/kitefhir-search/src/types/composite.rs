//! Composite search: `value1$value2` builds a conjunction over the
//! component parameters declared on the SearchParameter.

use kitefhir_core::FhirVersion;
use kitefhir_storage::{ParamFilter, Predicate};

use crate::error::SearchError;
use crate::parameters::SearchParameter;
use crate::registry::SearchParameterRegistry;
use crate::types::build_value_test;

/// Compile one composite value into a conjunction of component filters.
///
/// Each `$`-separated part is matched positionally against the declared
/// components; the component's definition URL resolves to the underlying
/// parameter, whose type drives value parsing. The resulting filters test
/// the component parameters' own index rows.
pub fn build_composite_predicate(
    registry: &SearchParameterRegistry,
    version: FhirVersion,
    definition: &SearchParameter,
    raw: &str,
) -> Result<Predicate, SearchError> {
    if definition.component.is_empty() {
        return Err(SearchError::invalid_value(
            &definition.code,
            "composite parameter has no components defined",
        ));
    }

    let parts: Vec<&str> = raw.split('$').collect();
    if parts.len() != definition.component.len() {
        return Err(SearchError::invalid_value(
            &definition.code,
            format!(
                "expected {} '$'-separated components, got {}",
                definition.component.len(),
                parts.len()
            ),
        ));
    }

    let mut filters = Vec::with_capacity(parts.len());
    for (component, part) in definition.component.iter().zip(parts) {
        let sub_param = registry
            .get_by_url(version, &component.definition)
            .ok_or_else(|| {
                SearchError::invalid_value(
                    &definition.code,
                    format!("unknown component definition '{}'", component.definition),
                )
            })?;

        let test = build_value_test(&sub_param, None, part)?;
        filters.push(Predicate::Leaf(ParamFilter::new(&sub_param.code, test)));
    }

    Ok(Predicate::And(filters))
}
