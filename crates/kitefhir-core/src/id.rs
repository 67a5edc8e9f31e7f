use crate::error::{CoreError, Result};
use uuid::Uuid;

/// Generate a new logical resource id (lowercase hyphenated UUID v4).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validate a FHIR resource id.
///
/// FHIR ids are 1-64 characters from `[A-Za-z0-9\-\.]`.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 {
        return Err(CoreError::invalid_id(format!(
            "id must be 1-64 characters, got {} characters",
            id.len()
        )));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(CoreError::invalid_id(format!(
            "id contains invalid character '{bad}'"
        )));
    }
    Ok(())
}
