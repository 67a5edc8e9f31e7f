//! Resource service: orchestrates the CRUD lifecycle over the guard,
//! validator seam, hook seam, indexer and storage.
//!
//! Storage receives fully-stamped versions; the service owns id and meta
//! assignment, version arithmetic, `If-Match` handling, the
//! custom-resource fallback and error mapping. Every method exists in an
//! `_in` form taking the store handle explicitly so the bundle processor
//! can run the same logic inside a transaction.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use kitefhir_api::ApiError;
use kitefhir_core::{FhirVersion, Interaction, generate_id, is_known_resource_type, validate_id};
use kitefhir_registry::{InteractionGuard, ResourceRegistry};
use kitefhir_search::{SearchIndexer, SearchOptions, SearchParameterRegistry, SearchPlan};
use kitefhir_storage::{
    HistoryPage, HistoryParams, NewResourceVersion, ResourceIndexer, ResourceStore, SearchPage,
    StoreOps, StoredResource,
};
use kitefhir_tenant::TenantContext;

use crate::config::{ValidationMode, ValidationSettings};
use crate::error::{from_registry, from_search, from_storage};
use crate::hooks::{Hook, HookContext, OperationDescriptor};
use crate::patch::apply_patch;
use crate::validation::ProfileValidator;

/// Request-scoped context: the resolved tenant and FHIR version, passed
/// explicitly through the call chain.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant: TenantContext,
    pub version: FhirVersion,
}

impl RequestContext {
    pub fn new(tenant: TenantContext, version: FhirVersion) -> Self {
        Self { tenant, version }
    }

    fn tenant_id(&self) -> &str {
        &self.tenant.internal_id
    }
}

pub struct ResourceService {
    resources: Arc<ResourceRegistry>,
    guard: InteractionGuard,
    search_params: Arc<SearchParameterRegistry>,
    indexer: SearchIndexer,
    store: Arc<dyn ResourceStore>,
    validator: Arc<dyn ProfileValidator>,
    hooks: Vec<Arc<dyn Hook>>,
    validation: ValidationSettings,
    search_options: SearchOptions,
}

impl ResourceService {
    pub fn new(
        resources: Arc<ResourceRegistry>,
        search_params: Arc<SearchParameterRegistry>,
        store: Arc<dyn ResourceStore>,
        validator: Arc<dyn ProfileValidator>,
        validation: ValidationSettings,
        search_options: SearchOptions,
    ) -> Self {
        Self {
            guard: InteractionGuard::new(resources.clone()),
            indexer: SearchIndexer::new(search_params.clone()),
            resources,
            search_params,
            store,
            validator,
            hooks: Vec::new(),
            validation,
            search_options,
        }
    }

    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn Hook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    pub fn search_params(&self) -> &Arc<SearchParameterRegistry> {
        &self.search_params
    }

    pub fn validator(&self) -> &Arc<dyn ProfileValidator> {
        &self.validator
    }

    pub fn validation_settings(&self) -> &ValidationSettings {
        &self.validation
    }

    // ==================== Hooks ====================

    fn descriptor(
        &self,
        resource_type: &str,
        interaction: Interaction,
        version: FhirVersion,
    ) -> OperationDescriptor {
        OperationDescriptor {
            resource_type: resource_type.to_string(),
            interaction,
            version,
        }
    }

    async fn run_before(
        &self,
        descriptor: &OperationDescriptor,
        ctx: &RequestContext,
        body: Option<&Value>,
    ) -> Result<(), ApiError> {
        for hook in self.hooks.iter().filter(|h| h.supports(descriptor)) {
            hook.before_op(&HookContext {
                descriptor,
                tenant: &ctx.tenant,
                body,
            })
            .await?;
        }
        Ok(())
    }

    async fn run_after(
        &self,
        descriptor: &OperationDescriptor,
        ctx: &RequestContext,
        result: &Value,
    ) -> Result<(), ApiError> {
        for hook in self.hooks.iter().filter(|h| h.supports(descriptor)) {
            hook.after_op(
                &HookContext {
                    descriptor,
                    tenant: &ctx.tenant,
                    body: None,
                },
                result,
            )
            .await?;
        }
        Ok(())
    }

    // ==================== Body preparation ====================

    /// Structural checks plus the configured validation mode.
    ///
    /// Types unknown to the structural parser take the custom-resource
    /// path: only `resourceType` equality is enforced before stamping.
    fn check_body(
        &self,
        version: FhirVersion,
        resource_type: &str,
        body: &Value,
    ) -> Result<(), ApiError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ApiError::bad_request("Resource body must be a JSON object"))?;

        let found = obj
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::required("Resource body is missing 'resourceType'"))?;
        if found != resource_type {
            return Err(ApiError::bad_request(format!(
                "resourceType '{found}' does not match request path type '{resource_type}'"
            )));
        }

        let custom = !is_known_resource_type(version, resource_type);
        if custom {
            tracing::debug!(resource_type, "Handling custom resource via raw JSON path");
        }

        if self.validation.enabled
            && self.validation.profile_validation != ValidationMode::Off
            && !custom
        {
            let config = self.resources.get(resource_type);
            let issues = self
                .validator
                .validate(version, resource_type, config, body);
            let errors: Vec<String> = issues
                .iter()
                .filter(|i| i.is_error())
                .map(|i| i.message.clone())
                .collect();
            if !errors.is_empty() {
                match self.validation.profile_validation {
                    ValidationMode::Strict => {
                        let outcome = validation_outcome(&errors);
                        return Err(ApiError::unprocessable_entity(
                            errors.join("; "),
                            Some(outcome),
                        ));
                    }
                    ValidationMode::Lenient => {
                        for message in &errors {
                            tracing::warn!(resource_type, %message, "Validation issue (lenient)");
                        }
                    }
                    ValidationMode::Off => {}
                }
            }
        }

        Ok(())
    }

    fn new_version(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        version_id: i64,
        content: Value,
        at: OffsetDateTime,
    ) -> NewResourceVersion {
        NewResourceVersion {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            version_id,
            fhir_version: ctx.version,
            index: self.indexer.index(ctx.version, resource_type, &content),
            content,
            last_updated: at,
        }
    }

    // ==================== Create ====================

    pub async fn create(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        body: Value,
    ) -> Result<StoredResource, ApiError> {
        self.create_in(&*self.store, ctx, resource_type, body).await
    }

    pub async fn create_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        mut body: Value,
    ) -> Result<StoredResource, ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Create)
            .map_err(from_registry)?;
        self.check_body(ctx.version, resource_type, &body)?;

        let descriptor = self.descriptor(resource_type, Interaction::Create, ctx.version);
        self.run_before(&descriptor, ctx, Some(&body)).await?;

        let id = generate_id();
        let now = kitefhir_core::now_utc();
        stamp_meta(&mut body, &id, 1, now);

        let new = self.new_version(ctx, resource_type, &id, 1, body, now);
        let stored = ops
            .create(ctx.tenant_id(), new)
            .await
            .map_err(from_storage)?;

        tracing::info!(resource_type, id = %stored.id, "Created resource");
        self.run_after(&descriptor, ctx, &stored.content).await?;
        Ok(stored)
    }

    // ==================== Read / VRead ====================

    pub async fn read(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, ApiError> {
        self.read_in(&*self.store, ctx, resource_type, id).await
    }

    pub async fn read_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Read)
            .map_err(from_registry)?;
        let descriptor = self.descriptor(resource_type, Interaction::Read, ctx.version);
        self.run_before(&descriptor, ctx, None).await?;

        let stored = ops
            .read(ctx.tenant_id(), resource_type, id)
            .await
            .map_err(from_storage)?;
        self.run_after(&descriptor, ctx, &stored.content).await?;
        Ok(stored)
    }

    /// Read of a specific version; tombstone versions are returned as
    /// their deletion marker.
    pub async fn vread(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        version_id: i64,
    ) -> Result<StoredResource, ApiError> {
        self.guard
            .check(resource_type, ctx.version, Interaction::Vread)
            .map_err(from_registry)?;
        self.store
            .vread(ctx.tenant_id(), resource_type, id, version_id)
            .await
            .map_err(from_storage)
    }

    // ==================== Update ====================

    pub async fn update(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        body: Value,
        if_match: Option<i64>,
    ) -> Result<(StoredResource, bool), ApiError> {
        self.update_in(&*self.store, ctx, resource_type, id, body, if_match)
            .await
    }

    /// Returns the stored resource and whether the write acted as a
    /// create (first version).
    pub async fn update_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        body: Value,
        if_match: Option<i64>,
    ) -> Result<(StoredResource, bool), ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Update)
            .map_err(from_registry)?;
        self.write_version(ops, ctx, resource_type, id, body, if_match, Interaction::Update)
            .await
    }

    async fn write_version(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        mut body: Value,
        if_match: Option<i64>,
        interaction: Interaction,
    ) -> Result<(StoredResource, bool), ApiError>
    {
        validate_id(id).map_err(|e| ApiError::bad_request(e.to_string()))?;
        self.check_body(ctx.version, resource_type, &body)?;
        if let Some(body_id) = body.get("id").and_then(Value::as_str)
            && body_id != id
        {
            return Err(ApiError::bad_request(format!(
                "Resource id '{body_id}' does not match request path id '{id}'"
            )));
        }

        let descriptor = self.descriptor(resource_type, interaction, ctx.version);
        self.run_before(&descriptor, ctx, Some(&body)).await?;

        let current = ops
            .max_version(ctx.tenant_id(), resource_type, id)
            .await
            .map_err(from_storage)?;

        if let Some(expected) = if_match {
            match current {
                Some(found) if found != expected => {
                    return Err(ApiError::conflict(format!(
                        "If-Match version {expected} does not match current version {found} of {resource_type}/{id}"
                    )));
                }
                None => {
                    return Err(ApiError::not_found(format!(
                        "Resource not found: {resource_type}/{id}"
                    )));
                }
                Some(_) => {}
            }
        }

        // first write through update acts as a create
        let version_id = current.unwrap_or(0) + 1;
        let now = kitefhir_core::now_utc();
        stamp_meta(&mut body, id, version_id, now);

        let new = self.new_version(ctx, resource_type, id, version_id, body, now);
        let stored = ops
            .put_version(ctx.tenant_id(), new)
            .await
            .map_err(from_storage)?;

        tracing::info!(resource_type, id, version_id, "Wrote resource version");
        self.run_after(&descriptor, ctx, &stored.content).await?;
        Ok((stored, version_id == 1))
    }

    // ==================== Patch ====================

    pub async fn patch(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        patch_body: Value,
    ) -> Result<StoredResource, ApiError> {
        self.patch_in(&*self.store, ctx, resource_type, id, patch_body)
            .await
    }

    pub async fn patch_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        patch_body: Value,
    ) -> Result<StoredResource, ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Patch)
            .map_err(from_registry)?;

        let current = ops
            .read(ctx.tenant_id(), resource_type, id)
            .await
            .map_err(from_storage)?;
        let patched = apply_patch(&current.content, &patch_body)?;

        let (stored, _) = self
            .write_version(
                ops,
                ctx,
                resource_type,
                id,
                patched,
                Some(current.version_id),
                Interaction::Patch,
            )
            .await?;
        Ok(stored)
    }

    // ==================== Delete ====================

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, ApiError> {
        self.delete_in(&*self.store, ctx, resource_type, id).await
    }

    pub async fn delete_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
    ) -> Result<StoredResource, ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Delete)
            .map_err(from_registry)?;
        let descriptor = self.descriptor(resource_type, Interaction::Delete, ctx.version);
        self.run_before(&descriptor, ctx, None).await?;

        let tombstone = ops
            .delete(ctx.tenant_id(), resource_type, id, kitefhir_core::now_utc())
            .await
            .map_err(from_storage)?;
        tracing::info!(resource_type, id, "Deleted resource");
        self.run_after(&descriptor, ctx, &tombstone.content).await?;
        Ok(tombstone)
    }

    // ==================== History ====================

    pub async fn history(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        id: &str,
        params: &HistoryParams,
    ) -> Result<HistoryPage, ApiError> {
        self.guard
            .check(resource_type, ctx.version, Interaction::History)
            .map_err(from_registry)?;
        self.store
            .history(ctx.tenant_id(), resource_type, id, params)
            .await
            .map_err(from_storage)
    }

    // ==================== Search ====================

    pub async fn search(
        &self,
        ctx: &RequestContext,
        resource_type: &str,
        raw_query: &str,
    ) -> Result<(SearchPage, SearchPlan), ApiError> {
        self.search_in(&*self.store, ctx, resource_type, raw_query)
            .await
    }

    pub async fn search_in(
        &self,
        ops: &dyn StoreOps,
        ctx: &RequestContext,
        resource_type: &str,
        raw_query: &str,
    ) -> Result<(SearchPage, SearchPlan), ApiError>
    {
        self.guard
            .check(resource_type, ctx.version, Interaction::Search)
            .map_err(from_registry)?;

        let plan = kitefhir_search::build_plan(
            &self.search_params,
            &self.resources,
            ctx.version,
            resource_type,
            raw_query,
            &self.search_options,
        )
        .map_err(from_search)?;

        let page = ops
            .search(ctx.tenant_id(), resource_type, &plan.query)
            .await
            .map_err(from_storage)?;
        Ok((page, plan))
    }
}

/// Stamp id, `meta.versionId` and `meta.lastUpdated`, preserving any
/// other meta fields the client sent.
fn stamp_meta(body: &mut Value, id: &str, version_id: i64, at: OffsetDateTime) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("id".to_string(), Value::String(id.to_string()));
        let meta = obj
            .entry("meta")
            .or_insert_with(|| Value::Object(Default::default()));
        if !meta.is_object() {
            *meta = Value::Object(Default::default());
        }
        if let Some(meta) = meta.as_object_mut() {
            meta.insert(
                "versionId".to_string(),
                Value::String(version_id.to_string()),
            );
            meta.insert(
                "lastUpdated".to_string(),
                Value::String(kitefhir_core::format_rfc3339(at)),
            );
        }
    }
}

fn validation_outcome(errors: &[String]) -> Value {
    serde_json::json!({
        "resourceType": "OperationOutcome",
        "issue": errors.iter().map(|message| serde_json::json!({
            "severity": "error",
            "code": "invalid",
            "diagnostics": message,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::BasicValidator;
    use kitefhir_db_memory::MemoryStore;
    use kitefhir_registry::config::ResourceConfig;
    use kitefhir_search::{SearchParamType, SearchParameter, register_common_parameters};
    use kitefhir_storage::HistoryMethod;
    use serde_json::json;

    fn service() -> ResourceService {
        let resources = Arc::new(
            ResourceRegistry::new(FhirVersion::R5)
                .with_config(ResourceConfig::open("Patient", FhirVersion::R5))
                .unwrap()
                .with_config(ResourceConfig::open("WidgetDefinition", FhirVersion::R5))
                .unwrap(),
        );
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
        ResourceService::new(
            resources,
            Arc::new(search_params),
            Arc::new(MemoryStore::new()),
            Arc::new(BasicValidator),
            ValidationSettings::default(),
            SearchOptions::default(),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new(TenantContext::new("default"), FhirVersion::R5)
    }

    fn patient_body() -> Value {
        json!({
            "resourceType": "Patient",
            "name": [{ "family": "Smith", "given": ["John"] }],
            "gender": "male",
            "birthDate": "1980-01-15"
        })
    }

    #[tokio::test]
    async fn create_assigns_id_and_meta() {
        let service = service();
        let stored = service.create(&ctx(), "Patient", patient_body()).await.unwrap();

        assert_eq!(stored.version_id, 1);
        assert!(!stored.id.is_empty());
        assert_eq!(stored.content["meta"]["versionId"], "1");
        assert!(stored.content["meta"]["lastUpdated"].is_string());
        // the original fields survive stamping
        assert_eq!(stored.content["name"][0]["family"], "Smith");
    }

    #[tokio::test]
    async fn create_then_read_round_trip() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();
        let read = service.read(&ctx(), "Patient", &created.id).await.unwrap();
        assert_eq!(read.content, created.content);
    }

    #[tokio::test]
    async fn create_rejects_type_mismatch_and_missing_type() {
        let service = service();
        let err = service
            .create(&ctx(), "Patient", json!({"resourceType": "Observation"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = service
            .create(&ctx(), "Patient", json!({"name": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Required(_)));
    }

    #[tokio::test]
    async fn update_bumps_version_and_preserves_history() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();

        let mut body = patient_body();
        body["name"][0]["family"] = json!("Smythe");
        let (updated, created_flag) = service
            .update(&ctx(), "Patient", &created.id, body, None)
            .await
            .unwrap();
        assert_eq!(updated.version_id, 2);
        assert!(!created_flag);
        assert_eq!(updated.content["meta"]["versionId"], "2");

        let v1 = service.vread(&ctx(), "Patient", &created.id, 1).await.unwrap();
        assert_eq!(v1.content["name"][0]["family"], "Smith");
    }

    #[tokio::test]
    async fn update_as_create() {
        let service = service();
        let (stored, created_flag) = service
            .update(&ctx(), "Patient", "client-chosen-id", patient_body(), None)
            .await
            .unwrap();
        assert!(created_flag);
        assert_eq!(stored.version_id, 1);
        assert_eq!(stored.id, "client-chosen-id");
    }

    #[tokio::test]
    async fn stale_if_match_conflicts() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();
        service
            .update(&ctx(), "Patient", &created.id, patient_body(), None)
            .await
            .unwrap();

        // resource is at version 2 now; If-Match 1 must conflict
        let err = service
            .update(&ctx(), "Patient", &created.id, patient_body(), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn body_id_mismatch_rejected() {
        let service = service();
        let mut body = patient_body();
        body["id"] = json!("other-id");
        let err = service
            .update(&ctx(), "Patient", "this-id", body, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_then_read_is_gone() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();
        let tombstone = service.delete(&ctx(), "Patient", &created.id).await.unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.version_id, 2);

        let err = service.read(&ctx(), "Patient", &created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Gone(_)));

        // vread of the tombstone returns the deletion marker
        let marker = service.vread(&ctx(), "Patient", &created.id, 2).await.unwrap();
        assert!(marker.is_deleted);
    }

    #[tokio::test]
    async fn history_methods_after_create_update_update_delete() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();
        service
            .update(&ctx(), "Patient", &created.id, patient_body(), None)
            .await
            .unwrap();
        service
            .update(&ctx(), "Patient", &created.id, patient_body(), None)
            .await
            .unwrap();
        service.delete(&ctx(), "Patient", &created.id).await.unwrap();

        let history = service
            .history(&ctx(), "Patient", &created.id, &HistoryParams::default())
            .await
            .unwrap();
        let methods: Vec<HistoryMethod> = history.entries.iter().map(|(_, m)| *m).collect();
        assert_eq!(
            methods,
            vec![
                HistoryMethod::Delete,
                HistoryMethod::Update,
                HistoryMethod::Update,
                HistoryMethod::Create
            ]
        );
        let versions: Vec<i64> = history.entries.iter().map(|(r, _)| r.version_id).collect();
        assert_eq!(versions, vec![4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn patch_preserves_unchanged_fields() {
        let service = service();
        let created = service.create(&ctx(), "Patient", patient_body()).await.unwrap();

        let patched = service
            .patch(
                &ctx(),
                "Patient",
                &created.id,
                json!([{ "op": "replace", "path": "/gender", "value": "female" }]),
            )
            .await
            .unwrap();
        assert_eq!(patched.version_id, 2);
        assert_eq!(patched.content["gender"], "female");
        assert_eq!(patched.content["name"], created.content["name"]);
        assert_eq!(patched.content["birthDate"], created.content["birthDate"]);
    }

    #[tokio::test]
    async fn custom_resource_round_trip() {
        let service = service();
        // WidgetDefinition is configured but unknown to the structural parser
        let body = json!({
            "resourceType": "WidgetDefinition",
            "kind": "gadget",
            "count": 3
        });
        let stored = service
            .create(&ctx(), "WidgetDefinition", body)
            .await
            .unwrap();
        assert_eq!(stored.content["kind"], "gadget");
        assert_eq!(stored.content["meta"]["versionId"], "1");

        let read = service
            .read(&ctx(), "WidgetDefinition", &stored.id)
            .await
            .unwrap();
        assert_eq!(read.content, stored.content);
    }

    #[tokio::test]
    async fn custom_resource_still_checks_type_equality() {
        let service = service();
        let err = service
            .create(
                &ctx(),
                "WidgetDefinition",
                json!({"resourceType": "OtherThing"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn disabled_interaction_is_method_not_allowed() {
        let mut config = ResourceConfig::open("Patient", FhirVersion::R5);
        config.interactions.delete = false;
        let resources = Arc::new(
            ResourceRegistry::new(FhirVersion::R5)
                .with_config(config)
                .unwrap(),
        );
        let mut search_params = SearchParameterRegistry::new();
        register_common_parameters(&mut search_params, FhirVersion::R5);
        let service = ResourceService::new(
            resources,
            Arc::new(search_params),
            Arc::new(MemoryStore::new()),
            Arc::new(BasicValidator),
            ValidationSettings::default(),
            SearchOptions::default(),
        );

        let err = service.delete(&ctx(), "Patient", "x").await.unwrap_err();
        assert!(matches!(err, ApiError::MethodNotAllowed(_)));
    }

    #[tokio::test]
    async fn unsupported_version_rejected() {
        let service = service();
        let r4b_ctx = RequestContext::new(TenantContext::new("default"), FhirVersion::R4B);
        let err = service
            .create(&r4b_ctx, "Patient", patient_body())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotSupported(_)));
    }

    #[tokio::test]
    async fn strict_validation_rejects_bad_resource() {
        let resources = Arc::new(
            ResourceRegistry::new(FhirVersion::R5)
                .with_config(ResourceConfig::open("Patient", FhirVersion::R5))
                .unwrap(),
        );
        let mut search_params = SearchParameterRegistry::new();
        register_common_parameters(&mut search_params, FhirVersion::R5);
        let service = ResourceService::new(
            resources,
            Arc::new(search_params),
            Arc::new(MemoryStore::new()),
            Arc::new(BasicValidator),
            ValidationSettings {
                profile_validation: ValidationMode::Strict,
                ..Default::default()
            },
            SearchOptions::default(),
        );

        let ok = service
            .create(&ctx(), "Patient", json!({"resourceType": "Patient"}))
            .await;
        assert!(ok.is_ok());

        let bad = service
            .create(
                &ctx(),
                "Patient",
                json!({"resourceType": "Patient", "id": 42}),
            )
            .await
            .unwrap_err();
        assert!(matches!(bad, ApiError::UnprocessableEntity { .. }));
    }

    #[tokio::test]
    async fn search_matches_created_resources() {
        let service = service();
        for _ in 0..3 {
            service.create(&ctx(), "Patient", patient_body()).await.unwrap();
        }
        let (page, plan) = service.search(&ctx(), "Patient", "family=Smith").await.unwrap();
        assert_eq!(page.total, Some(3));
        assert!(plan.warnings.is_empty());

        let (page, _) = service.search(&ctx(), "Patient", "family=Jones").await.unwrap();
        assert_eq!(page.total, Some(0));
    }

    #[tokio::test]
    async fn tenant_isolation_in_service() {
        let service = service();
        let t1 = RequestContext::new(TenantContext::new("t1"), FhirVersion::R5);
        let t2 = RequestContext::new(TenantContext::new("t2"), FhirVersion::R5);

        let created = service.create(&t1, "Patient", patient_body()).await.unwrap();
        let err = service.read(&t2, "Patient", &created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let (page, _) = service.search(&t2, "Patient", "").await.unwrap();
        assert_eq!(page.total, Some(0));
    }
}
