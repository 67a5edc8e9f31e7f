//! Server configuration, loaded from a TOML file plus `KITEFHIR_`
//! environment overrides.

use std::net::SocketAddr;

use kitefhir_core::FhirVersion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fhir: FhirSettings,
    #[serde(default)]
    pub config: ConfigPaths,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub tenant: TenantSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration: optional TOML file, then environment
    /// overrides (`KITEFHIR_SERVER__PORT=8080` style).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("kitefhir").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("KITEFHIR")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.search.default_count == 0 {
            return Err("search.default_count must be > 0".into());
        }
        if self.search.max_count == 0 {
            return Err("search.max_count must be > 0".into());
        }
        if self.search.default_count > self.search.max_count {
            return Err("search.default_count must be <= search.max_count".into());
        }
        if self.fhir.enabled_versions.is_empty() {
            return Err("fhir.enabled_versions must not be empty".into());
        }
        if !self
            .fhir
            .enabled_versions
            .contains(&self.fhir.default_version)
        {
            return Err("fhir.default_version must be listed in fhir.enabled_versions".into());
        }
        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.tenant.enabled && self.tenant.header_name.is_empty() {
            return Err("tenant.header_name must not be empty".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// External base URL used in Bundle links and fullUrl values.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            base_url: "http://localhost:8090/fhir".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirSettings {
    pub default_version: FhirVersion,
    pub enabled_versions: Vec<FhirVersion>,
}

impl Default for FhirSettings {
    fn default() -> Self {
        Self {
            default_version: FhirVersion::R5,
            enabled_versions: vec![FhirVersion::R5, FhirVersion::R4B],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPaths {
    /// Root of the configuration tree: `resources/*.yml` plus
    /// `<version>/searchparameters/*.json`.
    pub base_path: String,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            base_path: "config".to_string(),
        }
    }
}

/// How strictly profile validation is applied on writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    Strict,
    #[default]
    Lenient,
    Off,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub enabled: bool,
    pub profile_validation: ValidationMode,
    pub validate_search_parameters: bool,
    pub fail_on_unknown_search_parameters: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            profile_validation: ValidationMode::Lenient,
            validate_search_parameters: true,
            fail_on_unknown_search_parameters: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSettings {
    pub enabled: bool,
    pub header_name: String,
    pub default_tenant_id: String,
    pub cache_ttl_secs: u64,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "X-Tenant-ID".to_string(),
            default_tenant_id: "default".to_string(),
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_count: 20,
            max_count: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fhir.default_version, FhirVersion::R5);
        assert_eq!(config.search.default_count, 20);
        assert_eq!(config.tenant.header_name, "X-Tenant-ID");
    }

    #[test]
    fn parses_toml() {
        let toml_text = r#"
[server]
port = 9000
base_url = "https://fhir.example.org/fhir"

[fhir]
default_version = "R4B"
enabled_versions = ["R4B"]

[validation]
profile_validation = "strict"
fail_on_unknown_search_parameters = true

[tenant]
enabled = true
header_name = "X-Org-ID"

[search]
default_count = 50
max_count = 500
"#;
        let config: AppConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.fhir.default_version, FhirVersion::R4B);
        assert_eq!(config.validation.profile_validation, ValidationMode::Strict);
        assert!(config.validation.fail_on_unknown_search_parameters);
        assert!(config.tenant.enabled);
        assert_eq!(config.tenant.header_name, "X-Org-ID");
        assert_eq!(config.search.default_count, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = AppConfig::default();
        config.search.default_count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.search.default_count = 2000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.fhir.enabled_versions = vec![FhirVersion::R4B];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn addr_parses_host() {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".into();
        config.server.port = 8123;
        assert_eq!(config.addr().to_string(), "127.0.0.1:8123");
    }
}
