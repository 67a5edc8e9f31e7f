//! The resource registry: an immutable snapshot of per-resource
//! configuration, built once at startup.

use std::collections::HashMap;
use std::path::Path;

use kitefhir_core::{FhirVersion, Interaction};

use crate::config::ResourceConfig;
use crate::error::RegistryError;

/// Holds the configuration of every known resource type.
///
/// Build once, read-only thereafter; share behind an `Arc`.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    configs: HashMap<String, ResourceConfig>,
    global_default_version: FhirVersion,
}

impl ResourceRegistry {
    pub fn new(global_default_version: FhirVersion) -> Self {
        Self {
            configs: HashMap::new(),
            global_default_version,
        }
    }

    /// Register a config programmatically (used by tests and embedded setups).
    pub fn with_config(mut self, config: ResourceConfig) -> Result<Self, RegistryError> {
        self.insert(config, "<inline>")?;
        Ok(self)
    }

    fn insert(&mut self, config: ResourceConfig, source: &str) -> Result<(), RegistryError> {
        config
            .validate()
            .map_err(|msg| RegistryError::invalid_config(source, msg))?;
        self.configs.insert(config.resource_type.clone(), config);
        Ok(())
    }

    /// Load all `*.yml`/`*.yaml` files from a directory of per-resource
    /// configurations. A missing directory is fatal; an unparseable file
    /// is fatal and names the file.
    pub fn load_dir(
        dir: impl AsRef<Path>,
        global_default_version: FhirVersion,
    ) -> Result<Self, RegistryError> {
        let dir = dir.as_ref();
        let mut registry = Self::new(global_default_version);

        let entries = std::fs::read_dir(dir)
            .map_err(|e| RegistryError::Io(format!("{}: {e}", dir.display())))?;

        let mut loaded = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| RegistryError::Io(e.to_string()))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yml" || e == "yaml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            let text = std::fs::read_to_string(&path)
                .map_err(|e| RegistryError::Io(format!("{}: {e}", path.display())))?;
            let config: ResourceConfig = serde_yaml::from_str(&text).map_err(|e| {
                RegistryError::invalid_config(path.display().to_string(), e.to_string())
            })?;
            registry.insert(config, &path.display().to_string())?;
            loaded += 1;
        }

        tracing::info!(count = loaded, dir = %dir.display(), "Loaded resource configurations");
        Ok(registry)
    }

    /// The config for `resource_type`, if any.
    pub fn get(&self, resource_type: &str) -> Option<&ResourceConfig> {
        self.configs.get(resource_type)
    }

    /// The config for `resource_type`, enforcing presence and the enabled flag.
    pub fn require(&self, resource_type: &str) -> Result<&ResourceConfig, RegistryError> {
        let config = self
            .configs
            .get(resource_type)
            .ok_or_else(|| RegistryError::NotConfigured(resource_type.to_string()))?;
        if !config.enabled {
            return Err(RegistryError::ResourceDisabled(resource_type.to_string()));
        }
        Ok(config)
    }

    pub fn supports_version(&self, resource_type: &str, version: FhirVersion) -> bool {
        self.configs
            .get(resource_type)
            .map(|c| c.supports_version(version))
            .unwrap_or(false)
    }

    /// The default version for `resource_type`, falling back to the global
    /// default when the type is unknown.
    pub fn default_version(&self, resource_type: &str) -> FhirVersion {
        self.configs
            .get(resource_type)
            .and_then(|c| c.default_version())
            .unwrap_or(self.global_default_version)
    }

    pub fn global_default_version(&self) -> FhirVersion {
        self.global_default_version
    }

    /// Whether search parameter `name` is allowed for `resource_type`.
    /// No configured policy means everything defined is allowed.
    pub fn is_search_param_allowed(
        &self,
        resource_type: &str,
        name: &str,
        is_common: bool,
    ) -> bool {
        match self.configs.get(resource_type) {
            Some(config) => match &config.search_parameters {
                Some(policy) => policy.allows(name, is_common),
                None => true,
            },
            None => true,
        }
    }

    pub fn enabled_interactions(&self, resource_type: &str) -> Vec<Interaction> {
        self.configs
            .get(resource_type)
            .map(|c| c.interactions.enabled_list())
            .unwrap_or_default()
    }

    /// All configured resource types, sorted; used for CapabilityStatement
    /// generation.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.configs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchParamMode, SearchParamPolicy};
    use std::io::Write;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new(FhirVersion::R5)
            .with_config(ResourceConfig::open("Patient", FhirVersion::R5))
            .unwrap()
            .with_config(ResourceConfig::open("Observation", FhirVersion::R4B))
            .unwrap()
    }

    #[test]
    fn require_known_and_unknown() {
        let reg = registry();
        assert!(reg.require("Patient").is_ok());
        assert_eq!(
            reg.require("Widget").unwrap_err(),
            RegistryError::NotConfigured("Widget".into())
        );
    }

    #[test]
    fn require_disabled() {
        let mut config = ResourceConfig::open("Device", FhirVersion::R5);
        config.enabled = false;
        // disabled configs may list no versions
        let reg = ResourceRegistry::new(FhirVersion::R5)
            .with_config(config)
            .unwrap();
        assert_eq!(
            reg.require("Device").unwrap_err(),
            RegistryError::ResourceDisabled("Device".into())
        );
    }

    #[test]
    fn default_version_fallback() {
        let reg = registry();
        assert_eq!(reg.default_version("Patient"), FhirVersion::R5);
        assert_eq!(reg.default_version("Observation"), FhirVersion::R4B);
        // unknown type falls back to the global default
        assert_eq!(reg.default_version("Widget"), FhirVersion::R5);
    }

    #[test]
    fn supports_version() {
        let reg = registry();
        assert!(reg.supports_version("Patient", FhirVersion::R5));
        assert!(!reg.supports_version("Patient", FhirVersion::R4B));
        assert!(!reg.supports_version("Widget", FhirVersion::R5));
    }

    #[test]
    fn search_param_allowed_without_policy() {
        let reg = registry();
        assert!(reg.is_search_param_allowed("Patient", "family", false));
        assert!(reg.is_search_param_allowed("Patient", "_id", true));
    }

    #[test]
    fn search_param_allowlist_policy() {
        let mut config = ResourceConfig::open("Patient", FhirVersion::R5);
        config.search_parameters = Some(SearchParamPolicy {
            mode: SearchParamMode::Allowlist,
            common: ["_id".to_string()].into_iter().collect(),
            resource_specific: ["family".to_string()].into_iter().collect(),
        });
        let reg = ResourceRegistry::new(FhirVersion::R5)
            .with_config(config)
            .unwrap();
        assert!(reg.is_search_param_allowed("Patient", "family", false));
        assert!(!reg.is_search_param_allowed("Patient", "given", false));
        assert!(reg.is_search_param_allowed("Patient", "_id", true));
        assert!(!reg.is_search_param_allowed("Patient", "_lastUpdated", true));
    }

    #[test]
    fn load_dir_reads_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("patient.yml")).unwrap();
        writeln!(
            f,
            "resourceType: Patient\nfhirVersions:\n  - version: R5\n    default: true"
        )
        .unwrap();
        // non-yaml files are skipped
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let reg = ResourceRegistry::load_dir(dir.path(), FhirVersion::R5).unwrap();
        assert_eq!(reg.len(), 1);
        assert!(reg.get("Patient").is_some());
    }

    #[test]
    fn load_dir_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.yml"),
            "resourceType: Patient\nenabled: true\n",
        )
        .unwrap();
        let err = ResourceRegistry::load_dir(dir.path(), FhirVersion::R5).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn load_dir_missing_directory_fails() {
        let err = ResourceRegistry::load_dir("/nonexistent/kitefhir", FhirVersion::R5).unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
    }

    #[test]
    fn resource_types_sorted() {
        let reg = registry();
        assert_eq!(reg.resource_types(), vec!["Observation", "Patient"]);
    }
}
