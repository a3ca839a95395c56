//! Routing resources to backend services

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::iri;
use tracing::debug;
use url::Url;

/// A backend resolved from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendService {
    pub name: String,
    pub url: Url,
    /// Whether the service answers bulk calls
    pub bulk: bool,
}

impl BackendService {
    /// URL of a resource path on this service
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.url
            .join(path)
            .map_err(|e| LinkError::InvalidIri(format!("{}{}: {}", self.url, path, e)))
    }
}

#[derive(Debug, Clone)]
struct Route {
    service: BackendService,
    patterns: Vec<String>,
}

/// Picks the backend service responsible for a resource
///
/// Services are tried in configuration order; the first one with a path
/// pattern matching the resource path wins. Resources no pattern matches go
/// to the default service.
#[derive(Debug, Clone)]
pub struct ServiceRouter {
    routes: Vec<Route>,
    default_index: usize,
}

impl ServiceRouter {
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        let mut routes = Vec::with_capacity(config.services.len());
        for service in &config.services {
            let url = Url::parse(&service.url)
                .map_err(|e| LinkError::ConfigError(format!("service '{}': {}", service.name, e)))?;
            routes.push(Route {
                service: BackendService {
                    name: service.name.clone(),
                    url,
                    bulk: service.bulk,
                },
                patterns: service.paths.clone(),
            });
        }

        let default_index = routes
            .iter()
            .position(|r| r.service.name == config.default_service)
            .ok_or_else(|| {
                LinkError::ConfigError(format!(
                    "default_service '{}' is not a configured service",
                    config.default_service
                ))
            })?;

        Ok(ServiceRouter {
            routes,
            default_index,
        })
    }

    /// Service responsible for `iri`
    pub fn route(&self, iri: &str) -> &BackendService {
        let path = iri::path_of(iri);
        for route in &self.routes {
            if route.patterns.iter().any(|p| pattern_matches(p, &path)) {
                debug!("Routing {} to service {}", iri, route.service.name);
                return &route.service;
            }
        }
        &self.routes[self.default_index].service
    }

    pub fn services(&self) -> impl Iterator<Item = &BackendService> {
        self.routes.iter().map(|r| &r.service)
    }
}

/// Check if a single pattern matches a path
///
/// Supports simple glob-style patterns:
/// - `*` matches any sequence of characters
/// - Prefix matching otherwise
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    if !pattern.contains('*') {
        return path == pattern || path.starts_with(pattern);
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if !path.starts_with(first) {
        return false;
    }
    if parts.len() > 1 && !last.is_empty() && !path[first.len()..].ends_with(last) {
        return false;
    }

    // Middle parts must appear in order
    let mut current_pos = first.len();
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match path[current_pos..].find(part) {
            Some(pos) => current_pos += pos + part.len(),
            None => return false,
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn config() -> LinkConfig {
        LinkConfig {
            services: vec![
                ServiceConfig {
                    name: "data".to_string(),
                    url: "http://data.svc:3000".to_string(),
                    bulk: true,
                    paths: Vec::new(),
                },
                ServiceConfig {
                    name: "tokens".to_string(),
                    url: "http://tokens.svc:3000".to_string(),
                    bulk: false,
                    paths: vec!["/tokens".to_string(), "*/bearer/*".to_string()],
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_pattern_matches() {
        assert!(pattern_matches("/tokens", "/tokens"));
        assert!(pattern_matches("/tokens", "/tokens/1"));
        assert!(!pattern_matches("/tokens", "/other"));
        assert!(pattern_matches("*.png", "/images/a.png"));
        assert!(pattern_matches("/a/*/c", "/a/b/c"));
        assert!(!pattern_matches("/a/*/c", "/a/b/d"));
        assert!(pattern_matches("*/bearer/*", "/demo/bearer/x"));
        assert!(pattern_matches("*", "/anything"));
    }

    #[test]
    fn test_route_by_path() {
        let router = ServiceRouter::from_config(&config()).unwrap();
        assert_eq!(router.route("https://demo.test/tokens/abc").name, "tokens");
        assert_eq!(router.route("https://demo.test/demo/bearer/1").name, "tokens");
        assert_eq!(router.route("https://demo.test/posts/1").name, "data");
    }

    #[test]
    fn test_unknown_default_service() {
        let mut config = config();
        config.default_service = "nope".to_string();
        assert!(ServiceRouter::from_config(&config).is_err());
    }

    #[test]
    fn test_url_for() {
        let router = ServiceRouter::from_config(&config()).unwrap();
        let service = router.route("https://demo.test/tokens/abc");
        assert_eq!(
            service.url_for("/tokens/abc?x=1").unwrap().as_str(),
            "http://tokens.svc:3000/tokens/abc?x=1"
        );
    }
}
