//! Configuration management for the link cache

use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Configuration for the link cache service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Address the bulk endpoint listens on (default: "127.0.0.1:3080")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Whether to consult and fill the cache (default: true)
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Expiry of written cache entries in seconds; entries never expire when unset
    #[serde(default)]
    pub cache_ttl: Option<u64>,

    /// Language used when a request carries no Accept-Language (default: "en")
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Tenant serving requests without a tenant path segment
    #[serde(default)]
    pub default_tenant: Option<String>,

    /// Known tenants
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,

    /// Backend services, matched in order
    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    /// Service receiving resources no path pattern matches (default: "data")
    #[serde(default = "default_service")]
    pub default_service: String,

    /// Timeout for backend HTTP calls in seconds (default: 30)
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Number of response lines buffered ahead of the client (default: 32)
    #[serde(default = "default_channel_capacity")]
    pub response_channel_capacity: usize,

    /// Shorten IRIs in response lines relative to the tenant website (default: false)
    #[serde(default)]
    pub compact_output: bool,

    /// Bearer token required by the cache clear endpoint
    /// If not set, clear requests will not require authentication
    #[serde(default)]
    pub clear_token: Option<String>,

    /// Metrics endpoint configuration (optional)
    #[serde(default)]
    pub metrics_endpoint: Option<MetricsEndpointConfig>,
}

/// A tenant website
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantConfig {
    pub name: String,
    pub website_iri: String,
}

/// A backend service resources can be routed to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub name: String,

    /// Base URL, e.g. "http://data.svc:3000"
    pub url: String,

    /// Whether the service answers `POST /link-lib/bulk` (default: false)
    #[serde(default)]
    pub bulk: bool,

    /// Path patterns routed to this service; `*` matches any sequence
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Configuration for the metrics HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsEndpointConfig {
    /// Whether to enable the metrics endpoint (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Address to bind the metrics endpoint to (default: "127.0.0.1:9090")
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsEndpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

// Default value functions for serde
fn default_listen_address() -> String {
    "127.0.0.1:3080".to_string()
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en".to_string()
}

fn default_service() -> String {
    "data".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    32
}

fn default_metrics_address() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            listen_address: default_listen_address(),
            enable_cache: default_true(),
            cache_ttl: None,
            default_language: default_language(),
            default_tenant: None,
            tenants: Vec::new(),
            services: vec![ServiceConfig {
                name: default_service(),
                url: "http://127.0.0.1:3000".to_string(),
                bulk: true,
                paths: Vec::new(),
            }],
            default_service: default_service(),
            backend_timeout_secs: default_backend_timeout(),
            response_channel_capacity: default_channel_capacity(),
            compact_output: false,
            clear_token: None,
            metrics_endpoint: None,
        }
    }
}

impl LinkConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(LinkConfig)` if loading and validation succeed
    /// * `Err(LinkError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LinkError::ConfigError(format!("Failed to read config file: {}", e))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: LinkConfig = serde_yaml::from_str(content).map_err(|e| {
            LinkError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - at least one service, with unique names and parsable URLs
    /// - default_service names a configured service
    /// - tenant website IRIs parse, default_tenant names a configured tenant
    /// - backend_timeout_secs and response_channel_capacity must be > 0
    /// - cache_ttl must be > 0 when set
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(LinkError::ConfigError(
                "at least one service must be configured".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for service in &self.services {
            if !names.insert(service.name.as_str()) {
                return Err(LinkError::ConfigError(format!(
                    "duplicate service name '{}'",
                    service.name
                )));
            }
            Url::parse(&service.url).map_err(|e| {
                LinkError::ConfigError(format!(
                    "service '{}' has invalid url '{}': {}",
                    service.name, service.url, e
                ))
            })?;
        }

        if !names.contains(self.default_service.as_str()) {
            return Err(LinkError::ConfigError(format!(
                "default_service '{}' is not a configured service",
                self.default_service
            )));
        }

        for tenant in &self.tenants {
            Url::parse(&tenant.website_iri).map_err(|e| {
                LinkError::ConfigError(format!(
                    "tenant '{}' has invalid website_iri '{}': {}",
                    tenant.name, tenant.website_iri, e
                ))
            })?;
        }

        if let Some(default_tenant) = &self.default_tenant {
            if self.tenant(default_tenant).is_none() {
                return Err(LinkError::ConfigError(format!(
                    "default_tenant '{}' is not a configured tenant",
                    default_tenant
                )));
            }
        }

        if self.backend_timeout_secs == 0 {
            return Err(LinkError::ConfigError(
                "backend_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.response_channel_capacity == 0 {
            return Err(LinkError::ConfigError(
                "response_channel_capacity must be greater than 0".to_string(),
            ));
        }

        if self.cache_ttl == Some(0) {
            return Err(LinkError::ConfigError(
                "cache_ttl must be greater than 0 when set".to_string(),
            ));
        }

        if self.default_language.trim().is_empty() {
            return Err(LinkError::ConfigError(
                "default_language must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn tenant(&self, name: &str) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.name == name)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl.map(Duration::from_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// One line per notable setting, for startup logging
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("listen_address: {}", self.listen_address),
            format!("enable_cache: {}", self.enable_cache),
            format!(
                "cache_ttl: {}",
                self.cache_ttl
                    .map(|t| format!("{}s", t))
                    .unwrap_or_else(|| "none".to_string())
            ),
            format!("default_language: {}", self.default_language),
            format!("tenants: {}", self.tenants.len()),
        ];
        for service in &self.services {
            lines.push(format!(
                "service {}: {} (bulk: {}, paths: {})",
                service.name,
                service.url,
                service.bulk,
                service.paths.len()
            ));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            url: "http://localhost:3000".to_string(),
            bulk: false,
            paths: Vec::new(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert_eq!(config.default_language, "en");
        assert_eq!(config.backend_timeout_secs, 30);
        assert!(config.enable_cache);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_no_services() {
        let config = LinkConfig {
            services: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_default_service() {
        let config = LinkConfig {
            default_service: "missing".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_services() {
        let config = LinkConfig {
            services: vec![service("data"), service("data")],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_service_url() {
        let mut bad = service("data");
        bad.url = "not a url".to_string();
        let config = LinkConfig {
            services: vec![bad],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default_tenant() {
        let mut config = LinkConfig {
            default_tenant: Some("demo".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.tenants.push(TenantConfig {
            name: "demo".to_string(),
            website_iri: "https://demo.test/".to_string(),
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_values() {
        let config = LinkConfig {
            cache_ttl: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            backend_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinkConfig {
            response_channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
default_language: nl
cache_ttl: 600
services:
  - name: data
    url: http://data.svc:3000
    bulk: true
  - name: tokens
    url: http://tokens.svc:3000
    paths: ["/tokens*"]
"#;
        let config = LinkConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.default_language, "nl");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.services.len(), 2);
        assert!(!config.services[1].bulk);
        assert_eq!(config.listen_address, "127.0.0.1:3080");
    }

    #[test]
    fn test_summary() {
        let summary = LinkConfig::default().summary();
        assert!(summary.iter().any(|l| l.contains("cache_ttl: none")));
        assert!(summary.iter().any(|l| l.starts_with("service data")));
    }
}
