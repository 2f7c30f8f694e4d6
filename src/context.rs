//! Request-scoped collaborators consumed by template definitions
//!
//! Identity, service catalog and scale decisions live outside this crate;
//! definitions only see them through these types.

#[cfg(test)]
use mockall::automock;

use crate::config::TemplateConfig;
use crate::discovery::DiscoveryClient;
use crate::Result;

/// Identity of the caller a stack is created for
#[derive(Clone, Default)]
pub struct RequestContext {
    /// Bearer token passed through to the templates
    pub auth_token: String,
    /// Identity service endpoint
    pub auth_url: String,
    /// User name
    pub user_name: String,
    /// Tenant (project) name
    pub tenant: String,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the token out of logs
        f.debug_struct("RequestContext")
            .field("auth_url", &self.auth_url)
            .field("user_name", &self.user_name)
            .field("tenant", &self.tenant)
            .finish()
    }
}

/// Service endpoint lookup
#[cfg_attr(test, automock)]
pub trait ServiceCatalog: Send + Sync {
    /// Public URL of the provisioning service API
    fn provisioning_url(&self) -> Result<String>;
}

/// Catalog with a fixed provisioning URL
#[derive(Clone, Debug)]
pub struct StaticServiceCatalog {
    provisioning_url: String,
}

impl StaticServiceCatalog {
    /// Create a catalog that always returns `provisioning_url`
    pub fn new(provisioning_url: impl Into<String>) -> Self {
        Self {
            provisioning_url: provisioning_url.into(),
        }
    }
}

impl ServiceCatalog for StaticServiceCatalog {
    fn provisioning_url(&self) -> Result<String> {
        Ok(self.provisioning_url.clone())
    }
}

/// Chooses which nodes to remove when a cluster shrinks
#[cfg_attr(test, automock)]
pub trait ScaleManager: Send + Sync {
    /// Node identifiers slated for removal, chosen among the hosts reported
    /// under the stack output `hosts_output`
    fn get_removal_nodes(&self, hosts_output: &str) -> Vec<String>;
}

/// Everything a definition needs besides the profile and instance
#[derive(Clone, Copy)]
pub struct ProvisionContext<'a> {
    /// Caller identity
    pub request: &'a RequestContext,
    /// Service endpoint lookup
    pub catalog: &'a dyn ServiceCatalog,
    /// Transport for discovery services
    pub discovery: &'a dyn DiscoveryClient,
    /// Loaded configuration
    pub config: &'a TemplateConfig,
}

impl<'a> ProvisionContext<'a> {
    /// Bundle the collaborators for one request
    pub fn new(
        request: &'a RequestContext,
        catalog: &'a dyn ServiceCatalog,
        discovery: &'a dyn DiscoveryClient,
        config: &'a TemplateConfig,
    ) -> Self {
        Self {
            request,
            catalog,
            discovery,
            config,
        }
    }
}
