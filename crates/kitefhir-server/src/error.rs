//! Conversions from layer errors into HTTP-facing `ApiError` values,
//! following the server's status/issue-code table.

use kitefhir_api::ApiError;
use kitefhir_registry::RegistryError;
use kitefhir_search::SearchError;
use kitefhir_storage::StorageError;
use kitefhir_tenant::TenantError;

pub fn from_registry(err: RegistryError) -> ApiError {
    match err {
        RegistryError::NotConfigured(t) => {
            ApiError::not_found(format!("Resource type '{t}' is not configured"))
        }
        RegistryError::ResourceDisabled(t) => {
            ApiError::method_not_allowed(format!("Resource type '{t}' is disabled"))
        }
        RegistryError::VersionNotSupported { .. } => ApiError::not_supported(err.to_string()),
        RegistryError::InteractionDisabled { .. } => ApiError::method_not_allowed(err.to_string()),
        RegistryError::InvalidConfig { .. } | RegistryError::Io(_) => {
            ApiError::internal(err.to_string())
        }
    }
}

pub fn from_storage(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound { .. } | StorageError::VersionNotFound { .. } => {
            ApiError::not_found(err.to_string())
        }
        StorageError::Deleted { .. } => ApiError::gone(err.to_string()),
        StorageError::AlreadyExists { .. } | StorageError::VersionConflict { .. } => {
            ApiError::conflict(err.to_string())
        }
        StorageError::InvalidResource(msg) => ApiError::bad_request(msg),
        StorageError::Transaction(msg) | StorageError::Backend(msg) => ApiError::internal(msg),
    }
}

pub fn from_search(err: SearchError) -> ApiError {
    match err.outcome_code() {
        "not-supported" => ApiError::not_supported(err.to_string()),
        _ => ApiError::bad_request(err.to_string()),
    }
}

pub fn from_tenant(err: TenantError) -> ApiError {
    match err {
        TenantError::MissingHeader(_) | TenantError::InvalidHeader(_) => {
            ApiError::bad_request(err.to_string())
        }
        TenantError::NotFound(_) => ApiError::not_found(err.to_string()),
        TenantError::Disabled(_) => ApiError::forbidden(err.to_string()),
        TenantError::Lookup(msg) => ApiError::internal(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[test]
    fn registry_mappings() {
        assert_eq!(
            from_registry(RegistryError::NotConfigured("Widget".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            from_registry(RegistryError::interaction_disabled("Patient", "delete"))
                .status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        let err = from_registry(RegistryError::version_not_supported("Patient", "R4B"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_operation_outcome().issue[0].code, "not-supported");
    }

    #[test]
    fn storage_mappings() {
        assert_eq!(
            from_storage(StorageError::not_found("Patient", "x")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            from_storage(StorageError::deleted("Patient", "x")).status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            from_storage(StorageError::version_conflict("Patient", "x", 2, 1)).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn tenant_mappings() {
        assert_eq!(
            from_tenant(TenantError::InvalidHeader("zz".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            from_tenant(TenantError::NotFound(Uuid::nil())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            from_tenant(TenantError::Disabled(Uuid::nil())).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn search_mappings() {
        let err = from_search(SearchError::UnknownParameter("zz".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let err = from_search(SearchError::DisallowedParameter("zz".into()));
        assert_eq!(err.to_operation_outcome().issue[0].code, "not-supported");
    }
}
