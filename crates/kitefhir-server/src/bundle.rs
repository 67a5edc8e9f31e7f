//! Bundle processing: batch (independent entries) and transaction
//! (atomic, all-or-nothing) execution.
//!
//! Batch entries run directly against the store, each failure converted
//! into a response entry while siblings continue. Transaction entries run
//! through one store transaction; any failure rolls everything back and
//! the request answers with a single OperationOutcome.

use serde_json::Value;

use kitefhir_api::{
    ApiError, Bundle, BundleEntry, BundleEntryResponse, BundleEntrySearch, parse_weak_etag,
};
use kitefhir_core::format_rfc3339;
use kitefhir_storage::StoreOps;

use crate::service::{RequestContext, ResourceService};

/// One bundle entry, parsed and ready for dispatch.
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub method: String,
    pub resource_type: String,
    pub id: Option<String>,
    pub query: Option<String>,
    pub resource: Option<Value>,
    pub if_match: Option<i64>,
}

/// Parse a bundle entry's request section.
pub fn parse_entry(entry: &Value, index: usize) -> Result<ParsedEntry, ApiError> {
    let request = entry
        .get("request")
        .ok_or_else(|| ApiError::required(format!("Bundle entry {index} has no request")))?;
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ApiError::required(format!("Bundle entry {index} request has no method"))
        })?
        .to_ascii_uppercase();
    let url = request
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::required(format!("Bundle entry {index} request has no url")))?;

    let (resource_type, id, query) = parse_entry_url(url)?;
    let if_match = request
        .get("ifMatch")
        .and_then(Value::as_str)
        .and_then(parse_weak_etag);

    Ok(ParsedEntry {
        method,
        resource_type,
        id,
        query,
        resource: entry.get("resource").cloned(),
        if_match,
    })
}

/// Parse an entry URL of the form `[/fhir[/r4b|/r5]]/<Type>[/<Id>][?query]`.
fn parse_entry_url(url: &str) -> Result<(String, Option<String>, Option<String>), ApiError> {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query.to_string())),
        None => (url, None),
    };

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&"fhir") {
        segments.remove(0);
    }
    if matches!(segments.first(), Some(&"r4b") | Some(&"r5")) {
        segments.remove(0);
    }

    match segments.as_slice() {
        [resource_type] => Ok((resource_type.to_string(), None, query)),
        [resource_type, id] => Ok((resource_type.to_string(), Some(id.to_string()), query)),
        _ => Err(ApiError::bad_request(format!(
            "Cannot parse bundle entry url '{url}'"
        ))),
    }
}

fn status_line(status: axum::http::StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
}

fn success_entry(
    status: axum::http::StatusCode,
    stored: &kitefhir_storage::StoredResource,
    include_resource: bool,
) -> BundleEntry {
    BundleEntry {
        resource: include_resource.then(|| stored.content.clone()),
        response: Some(BundleEntryResponse {
            status: status_line(status),
            location: Some(stored.location()),
            etag: Some(stored.etag()),
            last_modified: Some(format_rfc3339(stored.last_updated)),
            outcome: None,
        }),
        ..Default::default()
    }
}

fn error_entry(err: &ApiError) -> BundleEntry {
    BundleEntry {
        response: Some(BundleEntryResponse {
            status: status_line(err.status_code()),
            outcome: serde_json::to_value(err.to_operation_outcome()).ok(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Execute one entry against a store handle (direct for batch, the open
/// transaction for transaction bundles).
async fn execute_entry(
    service: &ResourceService,
    ops: &dyn StoreOps,
    ctx: &RequestContext,
    entry: &ParsedEntry,
) -> Result<BundleEntry, ApiError>
{
    use axum::http::StatusCode;

    match entry.method.as_str() {
        "GET" => match &entry.id {
            Some(id) => {
                let stored = service
                    .read_in(ops, ctx, &entry.resource_type, id)
                    .await?;
                Ok(success_entry(StatusCode::OK, &stored, true))
            }
            None => {
                let (page, _plan) = service
                    .search_in(
                        ops,
                        ctx,
                        &entry.resource_type,
                        entry.query.as_deref().unwrap_or(""),
                    )
                    .await?;
                let entries = page
                    .resources
                    .into_iter()
                    .map(|r| BundleEntry {
                        resource: Some(r.content),
                        search: Some(BundleEntrySearch {
                            mode: "match".to_string(),
                            score: None,
                        }),
                        ..Default::default()
                    })
                    .collect();
                let searchset =
                    Bundle::searchset(page.total.map(|t| t as u64), entries, Vec::new());
                Ok(BundleEntry {
                    resource: serde_json::to_value(&searchset).ok(),
                    response: Some(BundleEntryResponse {
                        status: status_line(StatusCode::OK),
                        ..Default::default()
                    }),
                    ..Default::default()
                })
            }
        },
        "POST" => {
            let body = entry
                .resource
                .clone()
                .ok_or_else(|| ApiError::required("POST entry has no resource"))?;
            let stored = service
                .create_in(ops, ctx, &entry.resource_type, body)
                .await?;
            Ok(success_entry(StatusCode::CREATED, &stored, true))
        }
        "PUT" => {
            let id = entry
                .id
                .clone()
                .ok_or_else(|| ApiError::required("PUT entry url must include an id"))?;
            let body = entry
                .resource
                .clone()
                .ok_or_else(|| ApiError::required("PUT entry has no resource"))?;
            let (stored, created) = service
                .update_in(ops, ctx, &entry.resource_type, &id, body, entry.if_match)
                .await?;
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok(success_entry(status, &stored, true))
        }
        "DELETE" => {
            let id = entry
                .id
                .clone()
                .ok_or_else(|| ApiError::required("DELETE entry url must include an id"))?;
            let tombstone = service
                .delete_in(ops, ctx, &entry.resource_type, &id)
                .await?;
            Ok(success_entry(StatusCode::NO_CONTENT, &tombstone, false))
        }
        "PATCH" => {
            let id = entry
                .id
                .clone()
                .ok_or_else(|| ApiError::required("PATCH entry url must include an id"))?;
            let patch = entry
                .resource
                .clone()
                .ok_or_else(|| ApiError::required("PATCH entry has no patch document"))?;
            let stored = service
                .patch_in(ops, ctx, &entry.resource_type, &id, patch)
                .await?;
            Ok(success_entry(StatusCode::OK, &stored, true))
        }
        other => Err(ApiError::bad_request(format!(
            "Unsupported bundle entry method '{other}'"
        ))),
    }
}

/// Process a batch or transaction bundle.
pub async fn process_bundle(
    service: &ResourceService,
    ctx: &RequestContext,
    bundle: Value,
) -> Result<Bundle, ApiError> {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return Err(ApiError::bad_request("Request body must be a Bundle"));
    }
    let bundle_type = bundle
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::required("Bundle has no type"))?;

    let entries: Vec<ParsedEntry> = bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(i, e)| parse_entry(e, i))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    match bundle_type {
        "batch" => {
            let mut responses = Vec::with_capacity(entries.len());
            let store = service.store().clone();
            for entry in &entries {
                match execute_entry(service, &*store, ctx, entry).await {
                    Ok(response) => responses.push(response),
                    Err(err) => {
                        tracing::debug!(error = %err, "Batch entry failed");
                        responses.push(error_entry(&err));
                    }
                }
            }
            Ok(Bundle::batch_response(responses))
        }
        "transaction" => {
            let store = service.store().clone();
            if !store.supports_transactions() {
                return Err(ApiError::not_supported(
                    "Storage backend does not support transactions",
                ));
            }
            let txn = store
                .begin()
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;

            let mut responses = Vec::with_capacity(entries.len());
            for entry in &entries {
                match execute_entry(service, &*txn, ctx, entry).await {
                    Ok(response) => responses.push(response),
                    Err(err) => {
                        tracing::debug!(error = %err, "Transaction entry failed, rolling back");
                        txn.rollback()
                            .await
                            .map_err(|e| ApiError::internal(e.to_string()))?;
                        return Err(err);
                    }
                }
            }

            txn.commit()
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            Ok(Bundle::transaction_response(responses))
        }
        other => Err(ApiError::bad_request(format!(
            "Bundle type must be batch or transaction, got '{other}'"
        ))),
    }
}
