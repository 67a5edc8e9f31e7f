use thiserror::Error;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    #[error("Resource deleted: {resource_type}/{id}")]
    Deleted { resource_type: String, id: String },

    #[error("Resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    #[error("Version conflict on {resource_type}/{id}: expected {expected}, found {found}")]
    VersionConflict {
        resource_type: String,
        id: String,
        expected: i64,
        found: i64,
    },

    #[error("Version not found: {resource_type}/{id}/_history/{version_id}")]
    VersionNotFound {
        resource_type: String,
        id: String,
        version_id: i64,
    },

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn deleted(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Deleted {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn already_exists(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn version_conflict(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        expected: i64,
        found: i64,
    ) -> Self {
        Self::VersionConflict {
            resource_type: resource_type.into(),
            id: id.into(),
            expected,
            found,
        }
    }

    pub fn version_not_found(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: i64,
    ) -> Self {
        Self::VersionNotFound {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
        }
    }

    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource(message.into())
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
