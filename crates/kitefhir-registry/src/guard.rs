//! Interaction guard: rejects disabled interactions and unsupported
//! versions before a request reaches the service layer.

use std::sync::Arc;

use kitefhir_core::{FhirVersion, Interaction};

use crate::error::RegistryError;
use crate::registry::ResourceRegistry;

/// Stateless check against the registry snapshot.
#[derive(Debug, Clone)]
pub struct InteractionGuard {
    registry: Arc<ResourceRegistry>,
}

impl InteractionGuard {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }

    /// Verifies that `resource_type` exists, is enabled, supports
    /// `version`, and has `interaction` enabled.
    pub fn check(
        &self,
        resource_type: &str,
        version: FhirVersion,
        interaction: Interaction,
    ) -> Result<(), RegistryError> {
        let config = self.registry.require(resource_type)?;

        if !config.supports_version(version) {
            return Err(RegistryError::version_not_supported(
                resource_type,
                version.as_str(),
            ));
        }

        if !config.interaction_enabled(interaction) {
            return Err(RegistryError::interaction_disabled(
                resource_type,
                interaction.as_str(),
            ));
        }

        Ok(())
    }
}
