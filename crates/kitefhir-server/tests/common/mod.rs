//! Shared test fixtures: an app wired over the in-memory backend with
//! programmatic registries, plus a oneshot request helper.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use kitefhir_core::FhirVersion;
use kitefhir_db_memory::{MemoryStore, MemoryTenantStore};
use kitefhir_registry::ResourceRegistry;
use kitefhir_registry::config::{ResourceConfig, VersionEntry};
use kitefhir_search::{
    SearchOptions, SearchParamType, SearchParameter, SearchParameterRegistry,
    register_common_parameters,
};
use kitefhir_server::config::AppConfig;
use kitefhir_server::operations::OperationRegistry;
use kitefhir_server::validation::BasicValidator;
use kitefhir_server::{AppState, ResourceService, build_router};
use kitefhir_storage::TenantStore;
use kitefhir_tenant::{TenantResolver, TenantResolverConfig};

pub fn resource_registry() -> ResourceRegistry {
    let mut patient = ResourceConfig::open("Patient", FhirVersion::R5);
    patient.fhir_versions.push(VersionEntry {
        version: FhirVersion::R4B,
        default: false,
    });

    let mut appointment = ResourceConfig::open("Appointment", FhirVersion::R5);
    appointment.interactions.delete = false;

    ResourceRegistry::new(FhirVersion::R5)
        .with_config(patient)
        .unwrap()
        .with_config(ResourceConfig::open("Observation", FhirVersion::R5))
        .unwrap()
        .with_config(appointment)
        .unwrap()
}

pub fn search_registry() -> SearchParameterRegistry {
    let mut registry = SearchParameterRegistry::new();
    for version in [FhirVersion::R5, FhirVersion::R4B] {
        register_common_parameters(&mut registry, version);
        registry.register(
            version,
            SearchParameter::new(
                "family",
                "http://hl7.org/fhir/SearchParameter/individual-family",
                SearchParamType::String,
                vec!["Patient".to_string()],
            )
            .with_expression("Patient.name.family"),
        );
    }
    registry.register(
        FhirVersion::R5,
        SearchParameter::new(
            "gender",
            "http://hl7.org/fhir/SearchParameter/individual-gender",
            SearchParamType::Token,
            vec!["Patient".to_string()],
        )
        .with_expression("Patient.gender"),
    );
    registry.register(
        FhirVersion::R5,
        SearchParameter::new(
            "birthdate",
            "http://hl7.org/fhir/SearchParameter/individual-birthdate",
            SearchParamType::Date,
            vec!["Patient".to_string()],
        )
        .with_expression("Patient.birthDate"),
    );
    registry.register(
        FhirVersion::R5,
        SearchParameter::new(
            "date",
            "http://hl7.org/fhir/SearchParameter/clinical-date",
            SearchParamType::Date,
            vec!["AdverseEvent".to_string(), "Observation".to_string()],
        )
        .with_expression(
            "AdverseEvent.occurrence.ofType(dateTime) | Observation.effective",
        ),
    );
    registry.register(
        FhirVersion::R5,
        SearchParameter::new(
            "subject",
            "http://hl7.org/fhir/SearchParameter/Observation-subject",
            SearchParamType::Reference,
            vec!["Observation".to_string()],
        )
        .with_expression("Observation.subject")
        .with_targets(vec!["Patient".to_string()]),
    );
    registry
}

pub fn test_app_with_tenancy(tenant_enabled: bool) -> (Router, Arc<MemoryTenantStore>) {
    let resources = Arc::new(resource_registry());
    let search_params = Arc::new(search_registry());
    let store = Arc::new(MemoryStore::new());
    let tenant_store = Arc::new(MemoryTenantStore::new());

    let mut config = AppConfig::default();
    config.tenant.enabled = tenant_enabled;

    let tenant_resolver = Arc::new(TenantResolver::new(
        TenantResolverConfig {
            enabled: tenant_enabled,
            ..Default::default()
        },
        tenant_store.clone() as Arc<dyn TenantStore>,
    ));

    let service = Arc::new(ResourceService::new(
        resources.clone(),
        search_params.clone(),
        store,
        Arc::new(BasicValidator),
        config.validation.clone(),
        SearchOptions::default(),
    ));

    let state = AppState {
        config: Arc::new(config),
        resources,
        search_params,
        service,
        tenant_resolver,
        operations: Arc::new(OperationRegistry::with_builtins()),
    };

    (build_router(state), tenant_store)
}

pub fn test_app() -> Router {
    test_app_with_tenancy(false).0
}

/// Fire one request at the router and collect (status, headers, body).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Option<Value>) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/fhir+json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(&bytes).ok()
    };
    (status, headers, body)
}
