//! CapabilityStatement generation from the registries.

use kitefhir_api::{
    CapabilityStatement, CapabilityStatementResource, CapabilityStatementSearchParam,
};
use kitefhir_core::{FhirVersion, Interaction};
use kitefhir_registry::ResourceRegistry;
use kitefhir_search::SearchParameterRegistry;

fn interaction_code(interaction: Interaction) -> &'static str {
    match interaction {
        Interaction::Read => "read",
        Interaction::Vread => "vread",
        Interaction::Create => "create",
        Interaction::Update => "update",
        Interaction::Patch => "patch",
        Interaction::Delete => "delete",
        Interaction::Search => "search-type",
        Interaction::History => "history-instance",
    }
}

/// Build the server CapabilityStatement for one FHIR version: every
/// enabled resource type supporting that version, with its enabled
/// interactions and the search parameters its policy admits.
pub fn capability_statement(
    version: FhirVersion,
    resources: &ResourceRegistry,
    search_params: &SearchParameterRegistry,
) -> CapabilityStatement {
    let mut rest_resources = Vec::new();

    for resource_type in resources.resource_types() {
        let Some(config) = resources.get(resource_type) else {
            continue;
        };
        if !config.enabled || !config.supports_version(version) {
            continue;
        }

        let interactions: Vec<&str> = config
            .interactions
            .enabled_list()
            .into_iter()
            .map(interaction_code)
            .collect();

        let params: Vec<CapabilityStatementSearchParam> = search_params
            .allowed(version, resource_type, resources)
            .iter()
            .map(|p| CapabilityStatementSearchParam {
                name: p.code.clone(),
                param_type: p.param_type.as_str().to_string(),
            })
            .collect();

        rest_resources.push(
            CapabilityStatementResource::new(resource_type)
                .with_interactions(&interactions)
                .with_search_params(params),
        );
    }

    CapabilityStatement::server(
        version.fhir_release(),
        kitefhir_core::format_rfc3339(kitefhir_core::now_utc()),
    )
    .with_resources(rest_resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitefhir_registry::config::ResourceConfig;
    use kitefhir_search::{SearchParamType, SearchParameter, register_common_parameters};

    #[test]
    fn lists_supported_resources_with_interactions_and_params() {
        let mut patient = ResourceConfig::open("Patient", FhirVersion::R5);
        patient.interactions.delete = false;
        let resources = ResourceRegistry::new(FhirVersion::R5)
            .with_config(patient)
            .unwrap()
            .with_config(ResourceConfig::open("Observation", FhirVersion::R4B))
            .unwrap();

        let mut search_params = SearchParameterRegistry::new();
        register_common_parameters(&mut search_params, FhirVersion::R5);
        search_params.register(
            FhirVersion::R5,
            SearchParameter::new(
                "family",
                "http://hl7.org/fhir/SearchParameter/Patient-family",
                SearchParamType::String,
                vec!["Patient".to_string()],
            )
            .with_expression("Patient.name.family"),
        );

        let cs = capability_statement(FhirVersion::R5, &resources, &search_params);
        assert_eq!(cs.fhir_version, "5.0.0");

        let rest = &cs.rest[0];
        // Observation is R4B-only, so R5 lists Patient alone
        assert_eq!(rest.resource.len(), 1);
        let patient = &rest.resource[0];
        assert_eq!(patient.resource_type, "Patient");
        assert!(!patient.interaction.iter().any(|i| i.code == "delete"));
        assert!(patient.interaction.iter().any(|i| i.code == "search-type"));
        assert!(patient.search_param.iter().any(|p| p.name == "family"));
        assert!(patient.search_param.iter().any(|p| p.name == "_id"));
    }

    #[test]
    fn r4b_statement_reports_r4b_release() {
        let resources = ResourceRegistry::new(FhirVersion::R4B)
            .with_config(ResourceConfig::open("Observation", FhirVersion::R4B))
            .unwrap();
        let search_params = SearchParameterRegistry::new();
        let cs = capability_statement(FhirVersion::R4B, &resources, &search_params);
        assert_eq!(cs.fhir_version, "4.3.0");
        assert_eq!(cs.rest[0].resource[0].resource_type, "Observation");
    }
}
