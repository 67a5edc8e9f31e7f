//! Shared application state: immutable registries, the service, the
//! tenant resolver and the operation registry, all behind `Arc`s.

use std::sync::Arc;

use kitefhir_registry::ResourceRegistry;
use kitefhir_search::SearchParameterRegistry;
use kitefhir_tenant::TenantResolver;

use crate::config::AppConfig;
use crate::operations::OperationRegistry;
use crate::service::ResourceService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub resources: Arc<ResourceRegistry>,
    pub search_params: Arc<SearchParameterRegistry>,
    pub service: Arc<ResourceService>,
    pub tenant_resolver: Arc<TenantResolver>,
    pub operations: Arc<OperationRegistry>,
}
