//! Tenant resolution

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::iri;
use async_trait::async_trait;
use std::collections::HashMap;
use url::Url;

/// A website served by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tenant {
    pub name: String,
    pub website_iri: Url,
}

/// Looks up the tenant a request belongs to
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Resolve a tenant by path segment, or the default tenant for `None`
    async fn resolve(&self, name: Option<&str>) -> Result<Tenant>;
}

/// Tenants fixed at startup from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTenantResolver {
    tenants: HashMap<String, Tenant>,
    default_tenant: Option<String>,
}

impl StaticTenantResolver {
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        let mut tenants = HashMap::with_capacity(config.tenants.len());
        for tenant in &config.tenants {
            tenants.insert(
                tenant.name.clone(),
                Tenant {
                    name: tenant.name.clone(),
                    website_iri: iri::parse(&tenant.website_iri)?,
                },
            );
        }
        Ok(StaticTenantResolver {
            tenants,
            default_tenant: config.default_tenant.clone(),
        })
    }
}

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(&self, name: Option<&str>) -> Result<Tenant> {
        let name = match name.or(self.default_tenant.as_deref()) {
            Some(name) => name,
            None => return Err(LinkError::TenantNotFound("no tenant in request".to_string())),
        };
        self.tenants
            .get(name)
            .cloned()
            .ok_or_else(|| LinkError::TenantNotFound(name.to_string()))
    }
}
