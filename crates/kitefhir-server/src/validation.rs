//! Profile validation seam.
//!
//! A full StructureDefinition validator is an external collaborator; the
//! built-in validator enforces the structural invariants the core owns:
//! shape, resourceType equality, id syntax, and the required profiles
//! declared in the resource configuration.

use kitefhir_core::{FhirVersion, validate_id};
use kitefhir_registry::ResourceConfig;
use serde_json::Value;

/// One issue produced by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

/// Validation seam implemented by profile validators.
pub trait ProfileValidator: Send + Sync {
    fn validate(
        &self,
        version: FhirVersion,
        resource_type: &str,
        config: Option<&ResourceConfig>,
        content: &Value,
    ) -> Vec<ValidationIssue>;
}

/// Structural validator used when no external profile validator is wired
/// in.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl ProfileValidator for BasicValidator {
    fn validate(
        &self,
        _version: FhirVersion,
        resource_type: &str,
        config: Option<&ResourceConfig>,
        content: &Value,
    ) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let Some(obj) = content.as_object() else {
            issues.push(ValidationIssue::error("Resource body must be a JSON object"));
            return issues;
        };

        match obj.get("resourceType").and_then(Value::as_str) {
            None => issues.push(ValidationIssue::error("Missing 'resourceType' element")),
            Some(found) if found != resource_type => issues.push(ValidationIssue::error(
                format!("resourceType '{found}' does not match '{resource_type}'"),
            )),
            Some(_) => {}
        }

        if let Some(id) = obj.get("id") {
            match id.as_str() {
                Some(id_str) => {
                    if let Err(e) = validate_id(id_str) {
                        issues.push(ValidationIssue::error(e.to_string()));
                    }
                }
                None => issues.push(ValidationIssue::error("'id' must be a string")),
            }
        }

        if let Some(config) = config {
            let declared: Vec<&str> = obj
                .get("meta")
                .and_then(|m| m.get("profile"))
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            for required in config.required_profiles() {
                if !declared.contains(&required) {
                    issues.push(ValidationIssue::error(format!(
                        "Resource must declare required profile '{required}' in meta.profile"
                    )));
                }
            }
        }

        issues
    }
}
