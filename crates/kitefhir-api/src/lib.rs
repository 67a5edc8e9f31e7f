//! HTTP API types for the KiteFHIR server: error-to-OperationOutcome
//! mapping, response wrappers with FHIR headers, Bundle construction and
//! pagination links, content negotiation, and CapabilityStatement shapes.

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const FHIR_JSON: &str = "application/fhir+json";

// -------------------------
// OperationOutcome
// -------------------------

/// Minimal FHIR OperationOutcome representation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcome {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str, // always "OperationOutcome"
    pub issue: Vec<OperationOutcomeIssue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationOutcomeIssue {
    /// FHIR issue severity: fatal | error | warning | information
    pub severity: &'static str,
    /// FHIR IssueType code: invalid | required | not-found | conflict |
    /// deleted | not-supported | forbidden | unauthorized | business-rule |
    /// exception
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl OperationOutcome {
    pub fn single(
        severity: &'static str,
        code: &'static str,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue: vec![OperationOutcomeIssue {
                severity,
                code,
                diagnostics: Some(diagnostics.into()),
            }],
        }
    }

    /// Multiple warning issues, e.g. ignored search parameters.
    pub fn warnings(messages: Vec<String>) -> Self {
        Self {
            resource_type: "OperationOutcome",
            issue: messages
                .into_iter()
                .map(|msg| OperationOutcomeIssue {
                    severity: "warning",
                    code: "not-supported",
                    diagnostics: Some(msg),
                })
                .collect(),
        }
    }

    /// Informational outcome, e.g. a successful $validate.
    pub fn information(diagnostics: impl Into<String>) -> Self {
        Self::single("information", "informational", diagnostics)
    }

    pub fn has_issues(&self) -> bool {
        !self.issue.is_empty()
    }
}

// -------------------------
// API errors
// -------------------------

/// High-level API errors mapped to HTTP responses with an
/// OperationOutcome body. The variant set mirrors the server's error
/// table: every non-2xx response carries a FHIR issue code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Missing required input: {0}")]
    Required(String),
    /// 400 with issue code `not-supported` (unsupported version for a
    /// resource type, disallowed search parameter).
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// 404 with issue code `not-supported` (unknown extended operation).
    #[error("Operation not supported: {0}")]
    OperationNotSupported(String),
    /// 405: interaction disabled by configuration.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("Gone: {0}")]
    Gone(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    /// 422 with issue code `invalid` (profile validation in strict mode).
    #[error("Unprocessable entity: {message}")]
    UnprocessableEntity {
        message: String,
        operation_outcome: Option<Value>,
    },
    /// 422 with issue code `business-rule` (plugin seam).
    #[error("Business rule violated: {0}")]
    BusinessRule(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn required(msg: impl Into<String>) -> Self {
        Self::Required(msg.into())
    }
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn operation_not_supported(msg: impl Into<String>) -> Self {
        Self::OperationNotSupported(msg.into())
    }
    pub fn method_not_allowed(msg: impl Into<String>) -> Self {
        Self::MethodNotAllowed(msg.into())
    }
    pub fn gone(msg: impl Into<String>) -> Self {
        Self::Gone(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }
    pub fn unprocessable_entity(msg: impl Into<String>, outcome: Option<Value>) -> Self {
        Self::UnprocessableEntity {
            message: msg.into(),
            operation_outcome: outcome,
        }
    }
    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Required(_) | ApiError::NotSupported(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::OperationNotSupported(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::UnprocessableEntity { .. } | ApiError::BusinessRule(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_operation_outcome(&self) -> OperationOutcome {
        match self {
            ApiError::BadRequest(msg) => OperationOutcome::single("error", "invalid", msg),
            ApiError::Required(msg) => OperationOutcome::single("error", "required", msg),
            ApiError::NotSupported(msg) => {
                OperationOutcome::single("error", "not-supported", msg)
            }
            ApiError::Unauthorized(msg) => OperationOutcome::single("error", "unauthorized", msg),
            ApiError::Forbidden(msg) => OperationOutcome::single("error", "forbidden", msg),
            ApiError::NotFound(msg) => OperationOutcome::single("error", "not-found", msg),
            ApiError::OperationNotSupported(msg) => {
                OperationOutcome::single("error", "not-supported", msg)
            }
            ApiError::MethodNotAllowed(msg) => {
                OperationOutcome::single("error", "not-supported", msg)
            }
            ApiError::Gone(msg) => OperationOutcome::single("error", "deleted", msg),
            ApiError::Conflict(msg) => OperationOutcome::single("error", "conflict", msg),
            ApiError::UnsupportedMediaType(msg) => {
                OperationOutcome::single("error", "not-supported", msg)
            }
            ApiError::UnprocessableEntity { message, .. } => {
                OperationOutcome::single("error", "invalid", message)
            }
            ApiError::BusinessRule(msg) => {
                OperationOutcome::single("error", "business-rule", msg)
            }
            ApiError::Internal(msg) => OperationOutcome::single("fatal", "exception", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // UnprocessableEntity may carry a full validator-produced outcome
        let body = if let ApiError::UnprocessableEntity {
            operation_outcome: Some(outcome),
            ..
        } = &self
        {
            serde_json::to_vec(outcome)
        } else {
            serde_json::to_vec(&self.to_operation_outcome())
        };
        let body = body.unwrap_or_else(|_| {
            serde_json::to_vec(&OperationOutcome::single(
                "fatal",
                "exception",
                "Serialization failure",
            ))
            .unwrap_or_else(|_| b"{}".to_vec())
        });

        axum::http::Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON))
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

// -------------------------
// API response wrapper
// -------------------------

use axum::http::HeaderName;

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub value: T,
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl<T> ApiResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self {
            value,
            status,
            headers: Vec::new(),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }

    pub fn created(value: T) -> Self {
        Self::new(value, StatusCode::CREATED)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn with_etag_weak(mut self, version: impl std::fmt::Display) -> Self {
        let tag = format!("W/\"{version}\"");
        if let Ok(val) = HeaderValue::from_str(&tag) {
            self.headers.push((header::ETAG, val));
        }
        self
    }

    /// Raw Last-Modified header value (RFC 1123 dates expected).
    pub fn with_last_modified_raw(mut self, last_modified: impl Into<String>) -> Self {
        if let Ok(val) = HeaderValue::from_str(&last_modified.into()) {
            self.headers.push((header::LAST_MODIFIED, val));
        }
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        if let Ok(val) = HeaderValue::from_str(&location.into()) {
            self.headers.push((header::LOCATION, val));
        }
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = serde_json::to_vec(&self.value).unwrap_or_else(|_| {
            serde_json::to_vec(&OperationOutcome::single(
                "fatal",
                "exception",
                "Serialization failure",
            ))
            .unwrap_or_else(|_| b"{}".to_vec())
        });
        let mut builder = axum::http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

// -------------------------
// Content negotiation
// -------------------------

/// Validate the Accept header: `application/fhir+json` and
/// `application/json` are served. `application/fhir+xml` is recognized
/// but answered with not-supported: the XML codec is an external
/// serializer this seam would attach to.
pub fn validate_accept(headers: &HeaderMap) -> Result<(), ApiError> {
    if let Some(accept) = headers.get(header::ACCEPT) {
        let val = accept.to_str().unwrap_or("").to_ascii_lowercase();
        let allowed = val.contains("application/fhir+json")
            || val.contains("application/json")
            || val.contains("*/*");
        if !allowed {
            return Err(ApiError::unsupported_media_type(format!(
                "Unsupported Accept: {val}. Only application/fhir+json or application/json are supported."
            )));
        }
    }
    Ok(())
}

/// Validate Content-Type for requests with bodies. JSON Patch bodies
/// (`application/json-patch+json`) are additionally allowed on PATCH.
pub fn validate_content_type(headers: &HeaderMap, allow_patch: bool) -> Result<(), ApiError> {
    if let Some(ct) = headers.get(header::CONTENT_TYPE) {
        let val = ct.to_str().unwrap_or("").to_ascii_lowercase();
        let allowed = if val.starts_with("application/json-patch+json") {
            allow_patch
        } else {
            val.starts_with("application/fhir+json") || val.starts_with("application/json")
        };
        if !allowed {
            return Err(ApiError::unsupported_media_type(format!(
                "Unsupported Content-Type: {val}. Only application/fhir+json or application/json are supported."
            )));
        }
    }
    Ok(())
}

/// Parse a weak ETag (`W/"3"`) or bare version (`3`, `"3"`) into the
/// version id, for `If-Match` handling.
pub fn parse_weak_etag(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);
    let trimmed = trimmed.trim_matches('"');
    trimmed.parse().ok()
}

// -------------------------
// FHIR Bundle types
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "fullUrl")]
    pub full_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<BundleEntryResponse>,
}

/// Search component of a searchset entry: "match", "include" or "outcome".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleEntrySearch {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleEntryRequest {
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "ifMatch")]
    pub if_match: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BundleEntryResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bundle {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    #[serde(rename = "type")]
    pub bundle_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub link: Vec<BundleLink>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    fn new(bundle_type: &str, total: Option<u64>, entries: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle",
            bundle_type: bundle_type.to_string(),
            total,
            link: Vec::new(),
            entry: entries,
        }
    }

    pub fn searchset(total: Option<u64>, entries: Vec<BundleEntry>, links: Vec<BundleLink>) -> Self {
        let mut bundle = Self::new("searchset", total, entries);
        bundle.link = links;
        bundle
    }

    pub fn history(total: Option<u64>, entries: Vec<BundleEntry>) -> Self {
        Self::new("history", total, entries)
    }

    pub fn batch_response(entries: Vec<BundleEntry>) -> Self {
        Self::new("batch-response", None, entries)
    }

    pub fn transaction_response(entries: Vec<BundleEntry>) -> Self {
        Self::new("transaction-response", None, entries)
    }
}

// -------------------------
// Search result → Bundle generation
// -------------------------

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn build_page_url(
    base_url: &str,
    resource_type: &str,
    offset: usize,
    count: usize,
    query_suffix: Option<&str>,
) -> String {
    let mut url = format!(
        "{}/{}?_count={}&_offset={}",
        base_url.trim_end_matches('/'),
        resource_type,
        count,
        offset
    );
    if let Some(q) = query_suffix
        && !q.is_empty()
    {
        url.push('&');
        url.push_str(q.trim_start_matches(['&', '?']));
    }
    url
}

/// Pagination links for a searchset: `self`, `first`, `last`, and
/// `previous`/`next` when applicable. Non-pagination parameters are
/// preserved through `query_suffix`.
pub fn build_search_links(
    total: usize,
    base_url: &str,
    resource_type: &str,
    offset: usize,
    count: usize,
    query_suffix: Option<&str>,
) -> Vec<BundleLink> {
    let mut links = Vec::new();

    links.push(BundleLink {
        relation: "self".to_string(),
        url: build_page_url(base_url, resource_type, offset, count, query_suffix),
    });
    links.push(BundleLink {
        relation: "first".to_string(),
        url: build_page_url(base_url, resource_type, 0, count, query_suffix),
    });

    let last_offset = if count > 0 && total > 0 {
        ((total - 1) / count) * count
    } else {
        0
    };
    links.push(BundleLink {
        relation: "last".to_string(),
        url: build_page_url(base_url, resource_type, last_offset, count, query_suffix),
    });

    if offset > 0 {
        links.push(BundleLink {
            relation: "previous".to_string(),
            url: build_page_url(
                base_url,
                resource_type,
                offset.saturating_sub(count),
                count,
                query_suffix,
            ),
        });
    }
    if count > 0 && offset + count < total {
        links.push(BundleLink {
            relation: "next".to_string(),
            url: build_page_url(base_url, resource_type, offset + count, count, query_suffix),
        });
    }

    links
}

/// Build a searchset bundle from matched resources.
///
/// `warnings` (ignored parameters in lenient mode) become an
/// OperationOutcome entry with `search.mode = "outcome"` at the front of
/// the bundle.
#[allow(clippy::too_many_arguments)]
pub fn bundle_from_search(
    total: Option<usize>,
    resources: Vec<Value>,
    base_url: &str,
    resource_type: &str,
    offset: usize,
    count: usize,
    query_suffix: Option<&str>,
    warnings: Option<OperationOutcome>,
) -> Bundle {
    let mut entries = Vec::with_capacity(resources.len() + 1);

    if let Some(outcome) = warnings
        && outcome.has_issues()
    {
        entries.push(BundleEntry {
            resource: serde_json::to_value(&outcome).ok(),
            search: Some(BundleEntrySearch {
                mode: "outcome".to_string(),
                score: None,
            }),
            ..Default::default()
        });
    }

    for resource in resources {
        let full_url = resource
            .get("id")
            .and_then(Value::as_str)
            .map(|id| join_url(base_url, &format!("{resource_type}/{id}")));
        entries.push(BundleEntry {
            full_url,
            resource: Some(resource),
            search: Some(BundleEntrySearch {
                mode: "match".to_string(),
                score: None,
            }),
            ..Default::default()
        });
    }

    let links = build_search_links(
        total.unwrap_or(0),
        base_url,
        resource_type,
        offset,
        count,
        query_suffix,
    );
    Bundle::searchset(total.map(|t| t as u64), entries, links)
}

// -------------------------
// History bundle generation
// -------------------------

/// One history entry ready for bundle rendering.
#[derive(Debug, Clone)]
pub struct HistoryEntryView {
    /// Absent for delete entries.
    pub resource: Option<Value>,
    pub resource_type: String,
    pub id: String,
    pub version_id: i64,
    /// RFC 3339 timestamp.
    pub last_modified: String,
    pub method: &'static str,
}

impl HistoryEntryView {
    fn http_status(&self) -> &'static str {
        match self.method {
            "POST" => "201 Created",
            "DELETE" => "204 No Content",
            _ => "200 OK",
        }
    }
}

/// Build a history bundle, newest first, with `request` and `response`
/// per entry.
pub fn bundle_from_history(
    entries: Vec<HistoryEntryView>,
    base_url: &str,
    total: Option<usize>,
) -> Bundle {
    let bundle_entries = entries
        .into_iter()
        .map(|entry| {
            let request_url = if entry.method == "POST" {
                entry.resource_type.clone()
            } else {
                format!("{}/{}", entry.resource_type, entry.id)
            };
            BundleEntry {
                full_url: Some(join_url(
                    base_url,
                    &format!("{}/{}", entry.resource_type, entry.id),
                )),
                response: Some(BundleEntryResponse {
                    status: entry.http_status().to_string(),
                    etag: Some(format!("W/\"{}\"", entry.version_id)),
                    last_modified: Some(entry.last_modified.clone()),
                    location: None,
                    outcome: None,
                }),
                request: Some(BundleEntryRequest {
                    method: entry.method.to_string(),
                    url: request_url,
                    if_match: None,
                }),
                resource: entry.resource,
                search: None,
            }
        })
        .collect();

    Bundle::history(total.map(|t| t as u64), bundle_entries)
}

// -------------------------
// CapabilityStatement
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityStatement {
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    pub status: String,
    pub date: String,
    pub kind: String,
    #[serde(rename = "fhirVersion")]
    pub fhir_version: String,
    pub format: Vec<String>,
    pub rest: Vec<CapabilityStatementRest>,
}

impl CapabilityStatement {
    pub fn server(fhir_version: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            resource_type: "CapabilityStatement",
            status: "active".to_string(),
            date: date.into(),
            kind: "instance".to_string(),
            fhir_version: fhir_version.into(),
            format: vec![FHIR_JSON.to_string()],
            rest: vec![CapabilityStatementRest {
                mode: "server".to_string(),
                resource: Vec::new(),
            }],
        }
    }

    pub fn with_resources(mut self, resources: Vec<CapabilityStatementResource>) -> Self {
        if let Some(rest) = self.rest.first_mut() {
            rest.resource = resources;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityStatementRest {
    pub mode: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource: Vec<CapabilityStatementResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityStatementResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub interaction: Vec<CapabilityStatementInteraction>,
    #[serde(rename = "searchParam", skip_serializing_if = "Vec::is_empty", default)]
    pub search_param: Vec<CapabilityStatementSearchParam>,
}

impl CapabilityStatementResource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            interaction: Vec::new(),
            search_param: Vec::new(),
        }
    }

    pub fn with_interactions(mut self, codes: &[&str]) -> Self {
        self.interaction = codes
            .iter()
            .map(|code| CapabilityStatementInteraction {
                code: code.to_string(),
            })
            .collect();
        self
    }

    pub fn with_search_params(mut self, params: Vec<CapabilityStatementSearchParam>) -> Self {
        self.search_param = params;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityStatementInteraction {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityStatementSearchParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}




#[cfg(test)]
mod bundle_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn searchset_links_and_entries() {
        let bundle = bundle_from_search(
            Some(25),
            vec![json!({"resourceType": "Patient", "id": "p1"})],
            "http://localhost/fhir/r5",
            "Patient",
            10,
            10,
            Some("family=Smith"),
            None,
        );
        let j = serde_json::to_value(&bundle).unwrap();
        assert_eq!(j["resourceType"], "Bundle");
        assert_eq!(j["type"], "searchset");
        assert_eq!(j["total"], 25);
        assert_eq!(
            j["entry"][0]["fullUrl"],
            "http://localhost/fhir/r5/Patient/p1"
        );
        assert_eq!(j["entry"][0]["search"]["mode"], "match");

        let relations: Vec<&str> = bundle
            .link
            .iter()
            .map(|l| l.relation.as_str())
            .collect();
        assert_eq!(relations, vec!["self", "first", "last", "previous", "next"]);
        let next = bundle.link.iter().find(|l| l.relation == "next").unwrap();
        assert!(next.url.contains("_offset=20"));
        assert!(next.url.contains("family=Smith"));
    }

    #[test]
    fn searchset_last_page_has_no_next() {
        let bundle = bundle_from_search(
            Some(25),
            vec![],
            "http://localhost/fhir/r5",
            "Patient",
            20,
            10,
            None,
            None,
        );
        assert!(!bundle.link.iter().any(|l| l.relation == "next"));
        assert!(bundle.link.iter().any(|l| l.relation == "previous"));
        let last = bundle.link.iter().find(|l| l.relation == "last").unwrap();
        assert!(last.url.contains("_offset=20"));
    }

    #[test]
    fn searchset_first_page_has_no_previous() {
        let bundle = bundle_from_search(
            Some(5),
            vec![],
            "http://localhost/fhir/r5",
            "Patient",
            0,
            10,
            None,
            None,
        );
        assert!(!bundle.link.iter().any(|l| l.relation == "previous"));
        assert!(!bundle.link.iter().any(|l| l.relation == "next"));
    }

    #[test]
    fn warnings_become_outcome_entry() {
        let bundle = bundle_from_search(
            Some(0),
            vec![],
            "http://localhost/fhir",
            "Patient",
            0,
            10,
            None,
            Some(OperationOutcome::warnings(vec![
                "Unknown search parameter 'favoriteColor' was ignored".to_string(),
            ])),
        );
        assert_eq!(bundle.entry.len(), 1);
        assert_eq!(bundle.entry[0].search.as_ref().unwrap().mode, "outcome");
    }

    #[test]
    fn history_bundle_entries() {
        let bundle = bundle_from_history(
            vec![
                HistoryEntryView {
                    resource: None,
                    resource_type: "Patient".into(),
                    id: "p1".into(),
                    version_id: 2,
                    last_modified: "2024-05-02T00:00:00Z".into(),
                    method: "DELETE",
                },
                HistoryEntryView {
                    resource: Some(json!({"resourceType": "Patient", "id": "p1"})),
                    resource_type: "Patient".into(),
                    id: "p1".into(),
                    version_id: 1,
                    last_modified: "2024-05-01T00:00:00Z".into(),
                    method: "POST",
                },
            ],
            "http://localhost/fhir/r5",
            Some(2),
        );

        let j = serde_json::to_value(&bundle).unwrap();
        assert_eq!(j["type"], "history");
        assert_eq!(j["entry"][0]["request"]["method"], "DELETE");
        assert_eq!(j["entry"][0]["response"]["status"], "204 No Content");
        assert!(j["entry"][0].get("resource").is_none());
        assert_eq!(j["entry"][1]["request"]["method"], "POST");
        assert_eq!(j["entry"][1]["request"]["url"], "Patient");
        assert_eq!(j["entry"][1]["response"]["etag"], "W/\"1\"");
    }

    #[test]
    fn capability_statement_serializes() {
        let cs = CapabilityStatement::server("5.0.0", "2024-01-01")
            .with_resources(vec![
                CapabilityStatementResource::new("Patient")
                    .with_interactions(&["read", "create", "search-type"])
                    .with_search_params(vec![CapabilityStatementSearchParam {
                        name: "family".into(),
                        param_type: "string".into(),
                    }]),
            ]);
        let j = serde_json::to_value(&cs).unwrap();
        assert_eq!(j["resourceType"], "CapabilityStatement");
        assert_eq!(j["fhirVersion"], "5.0.0");
        assert_eq!(j["rest"][0]["resource"][0]["type"], "Patient");
        assert_eq!(j["rest"][0]["resource"][0]["interaction"][1]["code"], "create");
        assert_eq!(j["rest"][0]["resource"][0]["searchParam"][0]["name"], "family");
    }
}
