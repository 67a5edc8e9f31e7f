//! axum handlers for the FHIR REST API.
//!
//! The same handler set serves the versioned (`/fhir/r4b`, `/fhir/r5`)
//! and unversioned (`/fhir`) trees; a route-layer `VersionSelector`
//! extension tells each handler how to resolve the FHIR version, and the
//! tenant middleware injects the resolved `TenantContext`.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, middleware::Next};
use serde_json::Value;

use kitefhir_api::{
    ApiError, ApiResponse, OperationOutcome, bundle_from_history, bundle_from_search,
    parse_weak_etag, validate_accept, validate_content_type,
};
use kitefhir_core::format_rfc3339;
use kitefhir_storage::{HistoryParams, StoredResource};
use kitefhir_tenant::TenantContext;

use crate::bundle::process_bundle;
use crate::capability::capability_statement;
use crate::error::from_tenant;
use crate::operations::OperationContext;
use crate::service::RequestContext;
use crate::state::AppState;
use crate::version::{VersionContext, VersionSelector};

const FHIR_VERSION_HEADER_NAME: HeaderName = HeaderName::from_static("x-fhir-version");

// ==================== Middleware ====================

/// Resolves the tenant from the configured header and injects the
/// request-scoped `TenantContext`.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: axum::extract::Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(state.tenant_resolver.header_name())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match state.tenant_resolver.resolve(header_value.as_deref()).await {
        Ok(tenant) => {
            request.extensions_mut().insert(tenant);
            next.run(request).await
        }
        Err(err) => from_tenant(err).into_response(),
    }
}

// ==================== Helpers ====================

fn request_ctx(tenant: TenantContext, version: VersionContext) -> RequestContext {
    RequestContext::new(tenant, version.version)
}

fn version_header(version: VersionContext) -> (HeaderName, HeaderValue) {
    (
        FHIR_VERSION_HEADER_NAME,
        HeaderValue::from_static(version.version.as_str()),
    )
}

/// Base URL for fullUrl/link construction, mirroring the request's
/// version prefix.
fn base_url(state: &AppState, version: VersionContext) -> String {
    let base = state.config.server.base_url.trim_end_matches('/');
    if version.explicit {
        format!("{}/{}", base, version.version.path_segment())
    } else {
        base.to_string()
    }
}

fn http_date(at: time::OffsetDateTime) -> String {
    httpdate::fmt_http_date(std::time::SystemTime::from(at))
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    if body.is_empty() {
        return Err(ApiError::required("Request body is required"));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

fn parse_if_match(headers: &HeaderMap) -> Result<Option<i64>, ApiError> {
    match headers.get(header::IF_MATCH) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::bad_request("Invalid If-Match header"))?;
            parse_weak_etag(raw).map(Some).ok_or_else(|| {
                ApiError::bad_request(format!("Invalid If-Match header '{raw}'"))
            })
        }
    }
}

fn resource_response(
    status: StatusCode,
    stored: &StoredResource,
    version: VersionContext,
) -> ApiResponse<Value> {
    let (name, value) = version_header(version);
    ApiResponse::new(stored.content.clone(), status)
        .with_header(name, value)
        .with_etag_weak(stored.version_id)
        .with_last_modified_raw(http_date(stored.last_updated))
}

// ==================== CRUD handlers ====================

pub async fn handle_create(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path(resource_type): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, false)?;

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);
    let resource = parse_body(&body)?;

    let stored = state.service.create(&ctx, &resource_type, resource).await?;
    Ok(resource_response(StatusCode::CREATED, &stored, version)
        .with_location(stored.location())
        .into_response())
}

pub async fn handle_read_or_type_op(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id_or_op)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;

    // `/{Type}/$op` shares the path shape of `/{Type}/{id}`
    if let Some(op) = id_or_op.strip_prefix('$') {
        return invoke_operation(&state, selector, tenant, resource_type, None, op, None).await;
    }

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);
    let stored = state.service.read(&ctx, &resource_type, &id_or_op).await?;
    Ok(resource_response(StatusCode::OK, &stored, version).into_response())
}

pub async fn handle_type_op_post(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id_or_op)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, false)?;

    let Some(op) = id_or_op.strip_prefix('$') else {
        return Err(ApiError::method_not_allowed(
            "POST to an instance URL is not supported; use PUT to update",
        ));
    };
    let op_body = if body.is_empty() {
        None
    } else {
        Some(parse_body(&body)?)
    };
    invoke_operation(&state, selector, tenant, resource_type, None, op, op_body).await
}

pub async fn handle_update(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, false)?;

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);
    let resource = parse_body(&body)?;
    let if_match = parse_if_match(&headers)?;

    let (stored, created) = state
        .service
        .update(&ctx, &resource_type, &id, resource, if_match)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let mut response = resource_response(status, &stored, version);
    if created {
        response = response.with_location(stored.location());
    }
    Ok(response.into_response())
}

pub async fn handle_patch(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, true)?;

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);
    let patch_body = parse_body(&body)?;

    let stored = state
        .service
        .patch(&ctx, &resource_type, &id, patch_body)
        .await?;
    Ok(resource_response(StatusCode::OK, &stored, version).into_response())
}

pub async fn handle_delete(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);

    let tombstone = state.service.delete(&ctx, &resource_type, &id).await?;

    let (name, value) = version_header(version);
    let response = axum::http::Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(name, value)
        .header(header::ETAG, tombstone.etag())
        .body(axum::body::Body::empty())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(response)
}

// ==================== Versioned reads & history ====================

pub async fn handle_vread(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id, vid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;

    let version_id: i64 = vid
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid version id '{vid}'")))?;
    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);

    let stored = state
        .service
        .vread(&ctx, &resource_type, &id, version_id)
        .await?;
    Ok(resource_response(StatusCode::OK, &stored, version).into_response())
}

pub async fn handle_history(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);

    let parsed = kitefhir_search::parse_query(query.as_deref().unwrap_or(""));
    let params = HistoryParams {
        count: parse_usize_param(&parsed, "_count")?,
        offset: parse_usize_param(&parsed, "_offset")?,
        since: None,
    };

    let page = state
        .service
        .history(&ctx, &resource_type, &id, &params)
        .await?;

    let views: Vec<kitefhir_api::HistoryEntryView> = page
        .entries
        .into_iter()
        .map(|(stored, method)| kitefhir_api::HistoryEntryView {
            resource: (!stored.is_deleted).then(|| stored.content.clone()),
            resource_type: stored.resource_type.clone(),
            id: stored.id.clone(),
            version_id: stored.version_id,
            last_modified: format_rfc3339(stored.last_updated),
            method: method.http_method(),
        })
        .collect();

    let bundle = bundle_from_history(views, &base_url(&state, version), Some(page.total));
    let (name, value) = version_header(version);
    Ok(ApiResponse::ok(bundle).with_header(name, value).into_response())
}

fn parse_usize_param(
    parsed: &kitefhir_search::ParsedQuery,
    name: &str,
) -> Result<Option<usize>, ApiError> {
    match parsed.first_value(name) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ApiError::bad_request(format!("{name} must be a non-negative integer"))
        }),
    }
}

// ==================== Search ====================

pub async fn handle_search(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path(resource_type): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;

    let version = selector.resolve(&state.resources, &resource_type);
    let ctx = request_ctx(tenant, version);

    let (page, plan) = state
        .service
        .search(&ctx, &resource_type, query.as_deref().unwrap_or(""))
        .await?;

    let warnings = if plan.warnings.is_empty() {
        None
    } else {
        Some(OperationOutcome::warnings(plan.warnings.clone()))
    };

    let bundle = bundle_from_search(
        page.total,
        page.resources.into_iter().map(|r| r.content).collect(),
        &base_url(&state, version),
        &resource_type,
        plan.query.offset,
        plan.query.count,
        plan.link_query.as_deref(),
        warnings,
    );
    let (name, value) = version_header(version);
    Ok(ApiResponse::ok(bundle).with_header(name, value).into_response())
}

// ==================== Instance-level operations ====================

pub async fn handle_instance_op(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id, op)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    let Some(op) = op.strip_prefix('$') else {
        return Err(ApiError::not_found(format!(
            "No route for {resource_type}/{id}/{op}"
        )));
    };
    invoke_operation(&state, selector, tenant, resource_type, Some(id), op, None).await
}

pub async fn handle_instance_op_post(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    Path((resource_type, id, op)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, false)?;
    let Some(op) = op.strip_prefix('$') else {
        return Err(ApiError::not_found(format!(
            "No route for {resource_type}/{id}/{op}"
        )));
    };
    let op_body = if body.is_empty() {
        None
    } else {
        Some(parse_body(&body)?)
    };
    invoke_operation(
        &state,
        selector,
        tenant,
        resource_type,
        Some(id),
        op,
        op_body,
    )
    .await
}

async fn invoke_operation(
    state: &AppState,
    selector: VersionSelector,
    tenant: TenantContext,
    resource_type: String,
    id: Option<String>,
    op: &str,
    body: Option<Value>,
) -> Result<Response, ApiError> {
    let version = selector.resolve(&state.resources, &resource_type);
    let result = state
        .operations
        .invoke(
            op,
            OperationContext {
                tenant: &tenant,
                version: version.version,
                resource_type,
                id,
                body,
                service: state.service.as_ref(),
            },
        )
        .await?;
    let (name, value) = version_header(version);
    Ok(ApiResponse::ok(result).with_header(name, value).into_response())
}

// ==================== System-level handlers ====================

pub async fn handle_bundle(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    Extension(tenant): Extension<TenantContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;
    validate_content_type(&headers, false)?;

    let version = selector.resolve_system(&state.resources);
    let ctx = request_ctx(tenant, version);
    let bundle = parse_body(&body)?;

    let response = process_bundle(&state.service, &ctx, bundle).await?;
    let (name, value) = version_header(version);
    Ok(ApiResponse::ok(response).with_header(name, value).into_response())
}

pub async fn handle_metadata(
    State(state): State<AppState>,
    Extension(selector): Extension<VersionSelector>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    validate_accept(&headers)?;

    let version = selector.resolve_system(&state.resources);
    let statement = capability_statement(version.version, &state.resources, &state.search_params);
    let (name, value) = version_header(version);
    Ok(ApiResponse::ok(statement).with_header(name, value).into_response())
}
