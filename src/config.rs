//! Template definition configuration
//!
//! Every field has a default, so an empty file (or no file) yields a
//! working configuration with all definitions enabled and public discovery
//! services.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{yaml, Result};

/// Default etcd discovery endpoint, parameterized by master count
pub const DEFAULT_ETCD_DISCOVERY_ENDPOINT: &str = "https://discovery.etcd.io/new?size=%(size)d";

/// Default public swarm token service
pub const DEFAULT_PUBLIC_SWARM_DISCOVERY_URL: &str = "https://discovery.hub.docker.com/v1/clusters";

/// Default timeout for discovery requests
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Plugin names allowed to serve requests; empty enables every plugin
    pub enabled_definitions: Vec<String>,
    /// Discovery service settings
    pub discovery: DiscoveryConfig,
    /// Template file locations
    pub templates: TemplatePaths,
}

impl TemplateConfig {
    /// Parse configuration from YAML
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        yaml::from_yaml_str(input)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        yaml::from_yaml_file(path)
    }
}

/// Discovery service settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// etcd discovery endpoint template; `%(size)d` is the master count
    pub etcd_discovery_service_endpoint_format: String,
    /// Use the public swarm token service instead of a formatted URL
    pub public_swarm_discovery: bool,
    /// Public swarm token service URL
    pub public_swarm_discovery_url: String,
    /// Swarm discovery URL template; `%(bay_id)s` / `%(bay_uuid)s` placeholders
    pub swarm_discovery_url_format: Option<String>,
    /// Timeout for a single discovery request
    pub timeout_secs: u64,
}

impl DiscoveryConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            etcd_discovery_service_endpoint_format: DEFAULT_ETCD_DISCOVERY_ENDPOINT.to_string(),
            public_swarm_discovery: true,
            public_swarm_discovery_url: DEFAULT_PUBLIC_SWARM_DISCOVERY_URL.to_string(),
            swarm_discovery_url_format: None,
            timeout_secs: DEFAULT_DISCOVERY_TIMEOUT_SECS,
        }
    }
}

/// Template file locations for the built-in definitions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatePaths {
    /// Kubernetes on Fedora Atomic
    pub k8s_atomic: String,
    /// Kubernetes on CoreOS
    pub k8s_coreos: String,
    /// Swarm on Fedora Atomic
    pub swarm_atomic: String,
    /// Mesos on Ubuntu
    pub mesos_ubuntu: String,
}

impl Default for TemplatePaths {
    fn default() -> Self {
        Self {
            k8s_atomic: "templates/heat-kubernetes/kubecluster.yaml".to_string(),
            k8s_coreos: "templates/heat-kubernetes/kubecluster-coreos.yaml".to_string(),
            swarm_atomic: "templates/docker-swarm/swarm.yaml".to_string(),
            mesos_ubuntu: "templates/heat-mesos/mesoscluster.yaml".to_string(),
        }
    }
}
