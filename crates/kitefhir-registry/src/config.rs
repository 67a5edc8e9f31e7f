//! Per-resource declarative configuration, deserialized from YAML.

use kitefhir_core::{FhirVersion, Interaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration for one FHIR resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    pub resource_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub fhir_versions: Vec<VersionEntry>,
    #[serde(default)]
    pub interactions: InteractionSet,
    #[serde(default)]
    pub search_parameters: Option<SearchParamPolicy>,
    #[serde(default)]
    pub profiles: Vec<ProfileBinding>,
}

fn default_true() -> bool {
    true
}

impl ResourceConfig {
    /// A fully-open config for `resource_type` on a single version; used
    /// by tests and as the shape config files deserialize into.
    pub fn open(resource_type: impl Into<String>, version: FhirVersion) -> Self {
        Self {
            resource_type: resource_type.into(),
            enabled: true,
            fhir_versions: vec![VersionEntry {
                version,
                default: true,
            }],
            interactions: InteractionSet::all_enabled(),
            search_parameters: None,
            profiles: Vec::new(),
        }
    }

    pub fn supports_version(&self, version: FhirVersion) -> bool {
        self.fhir_versions.iter().any(|v| v.version == version)
    }

    pub fn default_version(&self) -> Option<FhirVersion> {
        self.fhir_versions
            .iter()
            .find(|v| v.default)
            .map(|v| v.version)
    }

    pub fn interaction_enabled(&self, interaction: Interaction) -> bool {
        self.interactions.enabled(interaction)
    }

    /// Required profile URLs from the profile bindings.
    pub fn required_profiles(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .filter(|p| p.required)
            .map(|p| p.url.as_str())
            .collect()
    }

    /// Structural validation applied at load time.
    pub fn validate(&self) -> Result<(), String> {
        if self.resource_type.is_empty() {
            return Err("resourceType must not be empty".into());
        }
        if !kitefhir_core::is_valid_resource_type_name(&self.resource_type) {
            return Err(format!(
                "'{}' is not a valid resource type name",
                self.resource_type
            ));
        }
        if self.enabled && self.fhir_versions.is_empty() {
            return Err(format!(
                "{} is enabled but lists no fhirVersions",
                self.resource_type
            ));
        }
        if !self.fhir_versions.is_empty() {
            let defaults = self.fhir_versions.iter().filter(|v| v.default).count();
            if defaults != 1 {
                return Err(format!(
                    "{} must mark exactly one fhirVersion as default, found {defaults}",
                    self.resource_type
                ));
            }
        }
        Ok(())
    }
}

/// One supported FHIR version with its default flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: FhirVersion,
    #[serde(default)]
    pub default: bool,
}

/// Enabled/disabled flags per RESTful interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSet {
    pub read: bool,
    pub vread: bool,
    pub create: bool,
    pub update: bool,
    pub patch: bool,
    pub delete: bool,
    pub search: bool,
    pub history: bool,
}

impl Default for InteractionSet {
    fn default() -> Self {
        Self::all_enabled()
    }
}

impl InteractionSet {
    pub fn all_enabled() -> Self {
        Self {
            read: true,
            vread: true,
            create: true,
            update: true,
            patch: true,
            delete: true,
            search: true,
            history: true,
        }
    }

    pub fn enabled(&self, interaction: Interaction) -> bool {
        match interaction {
            Interaction::Read => self.read,
            Interaction::Vread => self.vread,
            Interaction::Create => self.create,
            Interaction::Update => self.update,
            Interaction::Patch => self.patch,
            Interaction::Delete => self.delete,
            Interaction::Search => self.search,
            Interaction::History => self.history,
        }
    }

    pub fn enabled_list(&self) -> Vec<Interaction> {
        Interaction::ALL
            .into_iter()
            .filter(|i| self.enabled(*i))
            .collect()
    }
}

/// Allow/deny policy for search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParamPolicy {
    pub mode: SearchParamMode,
    #[serde(default)]
    pub common: BTreeSet<String>,
    #[serde(default)]
    pub resource_specific: BTreeSet<String>,
}

impl SearchParamPolicy {
    /// Whether `name` is allowed, given whether it is a common parameter.
    pub fn allows(&self, name: &str, is_common: bool) -> bool {
        let listed = if is_common {
            self.common.contains(name)
        } else {
            self.resource_specific.contains(name)
        };
        match self.mode {
            SearchParamMode::Allowlist => listed,
            SearchParamMode::Denylist => !listed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamMode {
    Allowlist,
    Denylist,
}

/// A profile bound to a resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBinding {
    pub url: String,
    #[serde(default)]
    pub required: bool,
}
