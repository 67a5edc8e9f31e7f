//! Patch application: RFC 6902 JSON Patch, plus a minimal FHIR Patch
//! (Parameters) subset converted into JSON Patch operations.

use kitefhir_api::ApiError;
use serde_json::Value;

/// The two accepted patch body forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// `application/json-patch+json`: an array of op/path/value entries.
    JsonPatch,
    /// `application/fhir+json` Parameters document with `operation`
    /// parameters (type add/replace/delete and simple dotted paths).
    FhirPatch,
}

/// Detect the patch form from the body shape.
pub fn detect_patch_kind(body: &Value) -> Result<PatchKind, ApiError> {
    if body.is_array() {
        return Ok(PatchKind::JsonPatch);
    }
    if body.get("resourceType").and_then(Value::as_str) == Some("Parameters") {
        return Ok(PatchKind::FhirPatch);
    }
    Err(ApiError::bad_request(
        "Patch body must be a JSON Patch array or a FHIR Parameters document",
    ))
}

/// Apply a patch to the current resource content, returning the patched
/// document.
pub fn apply_patch(current: &Value, patch_body: &Value) -> Result<Value, ApiError> {
    let operations = match detect_patch_kind(patch_body)? {
        PatchKind::JsonPatch => patch_body.clone(),
        PatchKind::FhirPatch => fhir_patch_to_json_patch(patch_body)?,
    };

    let patch: json_patch::Patch = serde_json::from_value(operations)
        .map_err(|e| ApiError::bad_request(format!("Invalid patch document: {e}")))?;

    let mut doc = current.clone();
    json_patch::patch(&mut doc, &patch)
        .map_err(|e| ApiError::bad_request(format!("Patch failed to apply: {e}")))?;
    Ok(doc)
}

/// Convert a FHIR Patch Parameters document into JSON Patch operations.
///
/// Supported operation types: `add`, `replace`, `delete`, with paths as
/// simple dotted element paths (`Patient.gender`, `name.0.family`).
/// Anything richer belongs to a full FHIRPath engine and is rejected.
fn fhir_patch_to_json_patch(parameters: &Value) -> Result<Value, ApiError> {
    let params = parameters
        .get("parameter")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_request("Parameters document has no 'parameter' list"))?;

    let mut operations = Vec::new();
    for param in params {
        if param.get("name").and_then(Value::as_str) != Some("operation") {
            continue;
        }
        let parts = param
            .get("part")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::bad_request("operation parameter has no parts"))?;

        let op_type = part_value_str(parts, "type")
            .ok_or_else(|| ApiError::bad_request("operation is missing a 'type' part"))?;
        let path = part_value_str(parts, "path")
            .ok_or_else(|| ApiError::bad_request("operation is missing a 'path' part"))?;
        let pointer = dotted_path_to_pointer(path)?;

        match op_type {
            "add" | "replace" => {
                let value = part_value(parts, "value").ok_or_else(|| {
                    ApiError::bad_request(format!("'{op_type}' operation requires a 'value' part"))
                })?;
                // FHIR add targets a container + name; the dotted form
                // already carries the full element path
                operations.push(serde_json::json!({
                    "op": if op_type == "add" { "add" } else { "replace" },
                    "path": pointer,
                    "value": value,
                }));
            }
            "delete" => {
                operations.push(serde_json::json!({ "op": "remove", "path": pointer }));
            }
            other => {
                return Err(ApiError::bad_request(format!(
                    "FHIR Patch operation type '{other}' is not supported; use add, replace or delete"
                )));
            }
        }
    }

    if operations.is_empty() {
        return Err(ApiError::bad_request(
            "Parameters document contains no 'operation' parameters",
        ));
    }
    Ok(Value::Array(operations))
}

fn part_value<'a>(parts: &'a [Value], name: &str) -> Option<&'a Value> {
    parts
        .iter()
        .find(|p| p.get("name").and_then(Value::as_str) == Some(name))
        .and_then(|p| {
            p.as_object()?
                .iter()
                .find(|(k, _)| k.starts_with("value"))
                .map(|(_, v)| v)
        })
}

fn part_value_str<'a>(parts: &'a [Value], name: &str) -> Option<&'a str> {
    part_value(parts, name).and_then(Value::as_str)
}

/// Convert `Patient.name.0.family` (resource type prefix optional) into a
/// JSON pointer `/name/0/family`.
fn dotted_path_to_pointer(path: &str) -> Result<String, ApiError> {
    let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(ApiError::bad_request("empty patch path"));
    }
    if segments[0]
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
    {
        segments.remove(0);
    }
    if segments.is_empty() {
        return Err(ApiError::bad_request(format!(
            "patch path '{path}' targets the whole resource"
        )));
    }
    Ok(format!("/{}", segments.join("/")))
}
