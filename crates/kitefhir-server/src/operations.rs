//! Extended operation seam (`$validate`, `$merge`, ...).
//!
//! Operations are values registered by code; the router dispatches
//! `/{Type}/$op` and `/{Type}/{id}/$op` here. Unknown operations answer
//! 404 `not-supported`. `$validate` ships built in; everything else is
//! provided by deployments through the registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use kitefhir_api::{ApiError, OperationOutcome};
use kitefhir_core::FhirVersion;
use kitefhir_tenant::TenantContext;

use crate::service::ResourceService;
use crate::validation::ProfileValidator;

/// Invocation context for one extended operation call.
pub struct OperationContext<'a> {
    pub tenant: &'a TenantContext,
    pub version: FhirVersion,
    pub resource_type: String,
    /// Present for instance-level invocations.
    pub id: Option<String>,
    /// Request body, if any (POST invocations).
    pub body: Option<Value>,
    pub service: &'a ResourceService,
}

#[async_trait]
pub trait OperationProvider: Send + Sync {
    /// The operation code without the `$` prefix (e.g. `validate`).
    fn code(&self) -> &str;

    async fn invoke(&self, ctx: OperationContext<'_>) -> Result<Value, ApiError>;
}

/// Registry of extended operations, keyed by code.
#[derive(Default)]
pub struct OperationRegistry {
    providers: HashMap<String, Arc<dyn OperationProvider>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default registry with the built-in operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ValidateOperation));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn OperationProvider>) {
        self.providers
            .insert(provider.code().to_string(), provider);
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn OperationProvider>> {
        self.providers.get(code).cloned()
    }

    /// Dispatch `$op`; the leading `$` has already been stripped by the
    /// router.
    pub async fn invoke(&self, code: &str, ctx: OperationContext<'_>) -> Result<Value, ApiError> {
        let provider = self.get(code).ok_or_else(|| {
            ApiError::operation_not_supported(format!("Operation ${code} is not supported"))
        })?;
        provider.invoke(ctx).await
    }
}

/// `$validate`: runs the profile validator against the supplied resource
/// and reports the issues as an OperationOutcome.
pub struct ValidateOperation;

#[async_trait]
impl OperationProvider for ValidateOperation {
    fn code(&self) -> &str {
        "validate"
    }

    async fn invoke(&self, ctx: OperationContext<'_>) -> Result<Value, ApiError> {
        let body = ctx
            .body
            .ok_or_else(|| ApiError::required("$validate requires a resource body"))?;

        // accept the resource directly or wrapped in a Parameters document
        let resource = if body.get("resourceType").and_then(Value::as_str) == Some("Parameters") {
            body.get("parameter")
                .and_then(Value::as_array)
                .and_then(|params| {
                    params
                        .iter()
                        .find(|p| p.get("name").and_then(Value::as_str) == Some("resource"))
                })
                .and_then(|p| p.get("resource"))
                .cloned()
                .ok_or_else(|| {
                    ApiError::required("Parameters document has no 'resource' parameter")
                })?
        } else {
            body
        };

        let config = ctx.service.resources().get(&ctx.resource_type);
        let issues = ctx.service.validator().validate(
            ctx.version,
            &ctx.resource_type,
            config,
            &resource,
        );

        let outcome = if issues.is_empty() {
            OperationOutcome::information("Validation successful")
        } else {
            OperationOutcome {
                resource_type: "OperationOutcome",
                issue: issues
                    .iter()
                    .map(|issue| kitefhir_api::OperationOutcomeIssue {
                        severity: if issue.is_error() { "error" } else { "warning" },
                        code: "invalid",
                        diagnostics: Some(issue.message.clone()),
                    })
                    .collect(),
            }
        };

        serde_json::to_value(&outcome)
            .map_err(|e| ApiError::internal(format!("Failed to render outcome: {e}")))
    }
}
