//! FHIR version resolution for request routing.
//!
//! Versioned routes (`/fhir/r4b/...`, `/fhir/r5/...`) carry an explicit
//! version; the unversioned tree (`/fhir/...`) resolves each resource
//! type's configured default. Every response echoes the version actually
//! used in the `X-FHIR-Version` header.

use kitefhir_core::FhirVersion;
use kitefhir_registry::ResourceRegistry;

/// Response header echoing the resolved FHIR version.
pub const FHIR_VERSION_HEADER: &str = "X-FHIR-Version";

/// How the request selected its FHIR version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// Version named in the URL (`/fhir/r5/...`).
    Explicit(FhirVersion),
    /// Unversioned URL; the resource's default applies.
    Default,
}

/// The resolved version for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionContext {
    pub version: FhirVersion,
    pub explicit: bool,
}

impl VersionSelector {
    /// Resolve against the registry for `resource_type`.
    pub fn resolve(&self, registry: &ResourceRegistry, resource_type: &str) -> VersionContext {
        match self {
            VersionSelector::Explicit(version) => VersionContext {
                version: *version,
                explicit: true,
            },
            VersionSelector::Default => VersionContext {
                version: registry.default_version(resource_type),
                explicit: false,
            },
        }
    }

    /// Resolve for system-level routes (bundle, metadata) where no
    /// resource type narrows the default.
    pub fn resolve_system(&self, registry: &ResourceRegistry) -> VersionContext {
        match self {
            VersionSelector::Explicit(version) => VersionContext {
                version: *version,
                explicit: true,
            },
            VersionSelector::Default => VersionContext {
                version: registry.global_default_version(),
                explicit: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitefhir_registry::config::ResourceConfig;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(FhirVersion::R5)
            .with_config(ResourceConfig::open("Patient", FhirVersion::R4B))
            .unwrap()
    }

    #[test]
    fn explicit_version_wins() {
        let ctx = VersionSelector::Explicit(FhirVersion::R5).resolve(&registry(), "Patient");
        assert_eq!(ctx.version, FhirVersion::R5);
        assert!(ctx.explicit);
    }

    #[test]
    fn default_resolves_per_resource() {
        let ctx = VersionSelector::Default.resolve(&registry(), "Patient");
        assert_eq!(ctx.version, FhirVersion::R4B);
        assert!(!ctx.explicit);
    }

    #[test]
    fn unknown_type_falls_back_to_global_default() {
        let ctx = VersionSelector::Default.resolve(&registry(), "Widget");
        assert_eq!(ctx.version, FhirVersion::R5);
    }

    #[test]
    fn system_resolution() {
        let ctx = VersionSelector::Default.resolve_system(&registry());
        assert_eq!(ctx.version, FhirVersion::R5);
        let ctx = VersionSelector::Explicit(FhirVersion::R4B).resolve_system(&registry());
        assert_eq!(ctx.version, FhirVersion::R4B);
    }
}
