//! KiteFHIR server: a multi-version, multi-tenant FHIR REST server core.
//!
//! Wires the registries, storage, tenant resolution, search and bundle
//! processing into an axum application. `build_app` assembles everything
//! from an `AppConfig` (loading the declarative config tree from disk);
//! `build_router` takes pre-built state, which is what tests use.

pub mod bundle;
pub mod capability;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod operations;
pub mod patch;
pub mod service;
pub mod state;
pub mod validation;
pub mod version;

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router, middleware};
use tower_http::trace::TraceLayer;

use kitefhir_core::FhirVersion;
use kitefhir_db_memory::{MemoryStore, MemoryTenantStore};
use kitefhir_registry::ResourceRegistry;
use kitefhir_search::{SearchOptions, load_search_parameters};
use kitefhir_storage::TenantStore;
use kitefhir_tenant::{TenantResolver, TenantResolverConfig};

pub use config::AppConfig;
pub use service::{RequestContext, ResourceService};
pub use state::AppState;

use crate::handlers as h;
use crate::operations::OperationRegistry;
use crate::validation::BasicValidator;
use crate::version::VersionSelector;

/// Routes shared by the versioned and unversioned trees.
fn fhir_routes(selector: VersionSelector) -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(h::handle_bundle))
        .route(
            "/metadata",
            get(h::handle_metadata).options(h::handle_metadata),
        )
        .route(
            "/{rtype}",
            get(h::handle_search).post(h::handle_create),
        )
        .route(
            "/{rtype}/{id}",
            get(h::handle_read_or_type_op)
                .put(h::handle_update)
                .patch(h::handle_patch)
                .delete(h::handle_delete)
                .post(h::handle_type_op_post),
        )
        .route("/{rtype}/{id}/_history", get(h::handle_history))
        .route("/{rtype}/{id}/_history/{vid}", get(h::handle_vread))
        .route(
            "/{rtype}/{id}/{op}",
            get(h::handle_instance_op).post(h::handle_instance_op_post),
        )
        .layer(Extension(selector))
}

/// Build the full router over pre-assembled state.
pub fn build_router(state: AppState) -> Router {
    let fhir = Router::new()
        .nest(
            "/r4b",
            fhir_routes(VersionSelector::Explicit(FhirVersion::R4B)),
        )
        .nest(
            "/r5",
            fhir_routes(VersionSelector::Explicit(FhirVersion::R5)),
        )
        .merge(fhir_routes(VersionSelector::Default));

    Router::new()
        .nest("/fhir", fhir)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            h::tenant_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble the application from configuration: load the resource and
/// search parameter registries from the config tree, build the in-memory
/// backend, and wire the service.
pub async fn build_app(config: AppConfig) -> anyhow::Result<Router> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let resources = Arc::new(ResourceRegistry::load_dir(
        std::path::Path::new(&config.config.base_path).join("resources"),
        config.fhir.default_version,
    )?);
    let search_params = Arc::new(load_search_parameters(
        &config.config.base_path,
        &config.fhir.enabled_versions,
    )?);

    let store = Arc::new(MemoryStore::new());
    let tenant_store: Arc<dyn TenantStore> = Arc::new(MemoryTenantStore::new());
    let tenant_resolver = Arc::new(TenantResolver::new(
        TenantResolverConfig {
            enabled: config.tenant.enabled,
            header_name: config.tenant.header_name.clone(),
            default_tenant_id: config.tenant.default_tenant_id.clone(),
            cache_ttl: time::Duration::seconds(config.tenant.cache_ttl_secs as i64),
        },
        tenant_store,
    ));

    let search_options = SearchOptions {
        default_count: config.search.default_count,
        max_count: config.search.max_count,
        fail_on_unknown: config.validation.fail_on_unknown_search_parameters,
    };

    let service = Arc::new(ResourceService::new(
        resources.clone(),
        search_params.clone(),
        store,
        Arc::new(BasicValidator),
        config.validation.clone(),
        search_options,
    ));

    let state = AppState {
        config: Arc::new(config),
        resources,
        search_params,
        service,
        tenant_resolver,
        operations: Arc::new(OperationRegistry::with_builtins()),
    };

    Ok(build_router(state))
}
