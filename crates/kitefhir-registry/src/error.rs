use thiserror::Error;

/// Errors raised by the resource registry and interaction guard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Resource type not configured: {0}")]
    NotConfigured(String),

    #[error("Resource type disabled: {0}")]
    ResourceDisabled(String),

    #[error("FHIR version {version} not supported for {resource_type}")]
    VersionNotSupported {
        resource_type: String,
        version: String,
    },

    #[error("Interaction '{interaction}' disabled for {resource_type}")]
    InteractionDisabled {
        resource_type: String,
        interaction: String,
    },

    #[error("Configuration error in {file}: {message}")]
    InvalidConfig { file: String, message: String },

    #[error("Failed to read configuration: {0}")]
    Io(String),
}

impl RegistryError {
    pub fn invalid_config(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn version_not_supported(
        resource_type: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::VersionNotSupported {
            resource_type: resource_type.into(),
            version: version.into(),
        }
    }

    pub fn interaction_disabled(
        resource_type: impl Into<String>,
        interaction: impl Into<String>,
    ) -> Self {
        Self::InteractionDisabled {
            resource_type: resource_type.into(),
            interaction: interaction.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            RegistryError::NotConfigured("Widget".into()).to_string(),
            "Resource type not configured: Widget"
        );
        assert_eq!(
            RegistryError::version_not_supported("Patient", "R4B").to_string(),
            "FHIR version R4B not supported for Patient"
        );
        assert_eq!(
            RegistryError::interaction_disabled("Patient", "delete").to_string(),
            "Interaction 'delete' disabled for Patient"
        );
    }
}
