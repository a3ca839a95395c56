use link_cache::{LinkConfig, LinkError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_bundled_config() {
    let config = LinkConfig::from_file("link_cache.yaml");
    assert!(config.is_ok(), "Failed to load bundled config: {:?}", config.err());

    let config = config.unwrap();
    assert_eq!(config.listen_address, "127.0.0.1:3080");
    assert_eq!(config.cache_ttl(), Some(Duration::from_secs(86400)));
    assert_eq!(config.default_tenant.as_deref(), Some("demo"));
    assert_eq!(config.tenants.len(), 2);
    assert_eq!(config.services.len(), 2);
    assert!(config.services[0].bulk);
    assert!(!config.services[1].bulk);
    assert!(config.metrics_endpoint.unwrap().enabled);
}

#[test]
fn test_load_minimal_config() {
    let file = write_config(
        r#"
services:
  - name: data
    url: "http://localhost:3000"
"#,
    );

    let config = LinkConfig::from_file(file.path()).unwrap();
    // Defaults are applied
    assert_eq!(config.listen_address, "127.0.0.1:3080");
    assert!(config.enable_cache);
    assert_eq!(config.cache_ttl(), None);
    assert_eq!(config.default_language, "en");
    assert_eq!(config.default_service, "data");
    assert_eq!(config.backend_timeout(), Duration::from_secs(30));
    assert_eq!(config.response_channel_capacity, 32);
    assert!(!config.compact_output);
    assert!(config.clear_token.is_none());
    assert!(config.metrics_endpoint.is_none());
}

#[test]
fn test_load_config_without_services() {
    let file = write_config("enable_cache: false\n");
    assert!(matches!(
        LinkConfig::from_file(file.path()),
        Err(LinkError::ConfigError(_))
    ));
}

#[test]
fn test_load_config_with_unknown_default_service() {
    let file = write_config(
        r#"
default_service: email
services:
  - name: data
    url: "http://localhost:3000"
"#,
    );
    let err = LinkConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("default_service"));
}

#[test]
fn test_load_config_with_unknown_default_tenant() {
    let file = write_config(
        r#"
default_tenant: missing
tenants:
  - name: demo
    website_iri: "https://demo.test/"
services:
  - name: data
    url: "http://localhost:3000"
"#,
    );
    assert!(LinkConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_config_with_zero_ttl() {
    let file = write_config(
        r#"
cache_ttl: 0
services:
  - name: data
    url: "http://localhost:3000"
"#,
    );
    assert!(LinkConfig::from_file(file.path()).is_err());
}

#[test]
fn test_load_malformed_yaml() {
    let file = write_config("services: [\n");
    let err = LinkConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

#[test]
fn test_load_nonexistent_file() {
    let config = LinkConfig::from_file("nonexistent.yaml");
    assert!(config.is_err(), "Should fail when file doesn't exist");
}
