//! Lifecycle hook seam.
//!
//! Hooks are capability records: plain values implementing a narrow
//! interface, iterated in registration order by the service. The plugin
//! orchestrator (authz, audit, caching) plugs in here; the core ships
//! none by default.

use async_trait::async_trait;
use kitefhir_api::ApiError;
use kitefhir_core::{FhirVersion, Interaction};
use kitefhir_tenant::TenantContext;
use serde_json::Value;

/// Identifies the operation a hook is consulted about.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub resource_type: String,
    pub interaction: Interaction,
    pub version: FhirVersion,
}

/// Context handed to hooks around an operation.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub descriptor: &'a OperationDescriptor,
    pub tenant: &'a TenantContext,
    /// Request body for writes, absent for reads.
    pub body: Option<&'a Value>,
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// Whether this hook wants to see the operation at all.
    fn supports(&self, descriptor: &OperationDescriptor) -> bool;

    /// Runs before the operation; an error aborts the request.
    async fn before_op(&self, _ctx: &HookContext<'_>) -> Result<(), ApiError> {
        Ok(())
    }

    /// Runs after a successful operation with the produced resource.
    async fn after_op(&self, _ctx: &HookContext<'_>, _result: &Value) -> Result<(), ApiError> {
        Ok(())
    }
}
