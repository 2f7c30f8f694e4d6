//! Cluster profile and cluster instance as seen by template definitions
//!
//! Both types are owned by an external persistence layer. Template
//! definitions read attributes off them by name (the names parameter
//! mappings declare) and write stack outputs back onto the instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Read access to named attributes
///
/// Unknown names and unset optional fields both read as `None`.
pub trait AttributeSource {
    /// Look up an attribute by name
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// Whether a value counts as "not provided" for parameter resolution
///
/// Null, empty strings and empty collections are empty. `false` and `0`
/// are real values: a required flag such as `tls_disabled` must resolve
/// when it is off, so only an absent value counts as missing.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn opt_string(value: &Option<String>) -> Option<Value> {
    value.as_ref().map(|s| Value::String(s.clone()))
}

/// (infrastructure kind, OS, engine) key that selects a template definition
///
/// Components are opaque and compared case-sensitively.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionKey {
    /// Infrastructure kind (e.g., "vm", "bm")
    pub infra_kind: String,
    /// Base OS / distro (e.g., "fedora-atomic", "coreos")
    pub os: String,
    /// Orchestration engine (e.g., "kubernetes", "swarm", "mesos")
    pub engine: String,
}

impl DefinitionKey {
    /// Create a key from its three components
    pub fn new(infra_kind: impl Into<String>, os: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            infra_kind: infra_kind.into(),
            os: os.into(),
            engine: engine.into(),
        }
    }
}

impl From<(&str, &str, &str)> for DefinitionKey {
    fn from((infra_kind, os, engine): (&str, &str, &str)) -> Self {
        Self::new(infra_kind, os, engine)
    }
}

impl std::fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.infra_kind, self.os, self.engine)
    }
}

/// Reusable provisioning choices for a cluster
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterProfile {
    /// Profile name
    pub name: String,
    /// Profile UUID
    pub uuid: String,
    /// Glance image used for every server
    pub image_id: Option<String>,
    /// SSH keypair injected into servers
    pub keypair_id: Option<String>,
    /// Flavor for worker nodes
    pub flavor_id: Option<String>,
    /// Flavor for master nodes
    pub master_flavor_id: Option<String>,
    /// External network for floating IPs
    pub external_network_id: Option<String>,
    /// Pre-existing fixed network
    pub fixed_network: Option<String>,
    /// DNS server for the cluster network
    pub dns_nameserver: Option<String>,
    /// Docker volume size in GB
    pub docker_volume_size: Option<u32>,
    /// Container network driver (e.g., "flannel")
    pub network_driver: Option<String>,
    /// HTTP proxy for nodes
    pub http_proxy: Option<String>,
    /// HTTPS proxy for nodes
    pub https_proxy: Option<String>,
    /// Hosts that bypass the proxy
    pub no_proxy: Option<String>,
    /// Whether TLS is disabled for the cluster API
    pub tls_disabled: bool,
    /// Whether a local docker registry is deployed
    pub registry_enabled: bool,
    /// Free-form engine overrides
    pub labels: BTreeMap<String, String>,
    /// Infrastructure kind (first triple component)
    pub server_type: String,
    /// Base OS (second triple component)
    pub cluster_distro: String,
    /// Orchestration engine (third triple component)
    pub coe: String,
}

impl ClusterProfile {
    /// The triple this profile requests
    pub fn definition_key(&self) -> DefinitionKey {
        DefinitionKey::new(&self.server_type, &self.cluster_distro, &self.coe)
    }

    /// Look up a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

impl AttributeSource for ClusterProfile {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            "uuid" => Some(Value::String(self.uuid.clone())),
            "image_id" => opt_string(&self.image_id),
            "keypair_id" => opt_string(&self.keypair_id),
            "flavor_id" => opt_string(&self.flavor_id),
            "master_flavor_id" => opt_string(&self.master_flavor_id),
            "external_network_id" => opt_string(&self.external_network_id),
            "fixed_network" => opt_string(&self.fixed_network),
            "dns_nameserver" => opt_string(&self.dns_nameserver),
            "docker_volume_size" => self.docker_volume_size.map(Value::from),
            "network_driver" => opt_string(&self.network_driver),
            "http_proxy" => opt_string(&self.http_proxy),
            "https_proxy" => opt_string(&self.https_proxy),
            "no_proxy" => opt_string(&self.no_proxy),
            "tls_disabled" => Some(Value::Bool(self.tls_disabled)),
            "registry_enabled" => Some(Value::Bool(self.registry_enabled)),
            "labels" => serde_json::to_value(&self.labels).ok(),
            "server_type" => Some(Value::String(self.server_type.clone())),
            "cluster_distro" => Some(Value::String(self.cluster_distro.clone())),
            "coe" => Some(Value::String(self.coe.clone())),
            _ => None,
        }
    }
}

/// One running cluster, populated from stack outputs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInstance {
    /// Numeric database id
    pub id: u64,
    /// Cluster UUID
    pub uuid: String,
    /// Cluster name
    pub name: String,
    /// Number of master nodes
    pub master_count: u32,
    /// Number of worker nodes
    pub node_count: u32,
    /// Cached bootstrap discovery URL
    pub discovery_url: Option<String>,
    /// Cluster API endpoint
    pub api_address: Option<String>,
    /// Worker node addresses
    pub node_addresses: Vec<String>,
    /// Master node addresses
    pub master_addresses: Vec<String>,
    /// Provisioning stack id
    pub stack_id: Option<String>,
}

impl ClusterInstance {
    /// Write a stack output value onto a named attribute
    ///
    /// String attributes take strings verbatim and render other scalars;
    /// address lists accept a list or a single address. Only attributes that
    /// stack outputs can populate are writable.
    pub fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        match name {
            "name" => self.name = value_to_string(value).unwrap_or_default(),
            "discovery_url" => self.discovery_url = value_to_string(value),
            "api_address" => self.api_address = value_to_string(value),
            "stack_id" => self.stack_id = value_to_string(value),
            "node_addresses" => self.node_addresses = value_to_list(value),
            "master_addresses" => self.master_addresses = value_to_list(value),
            _ => return Err(Error::attribute_lookup(name, "cluster instance")),
        }
        Ok(())
    }

    /// The cached discovery URL, if one has been resolved
    pub fn cached_discovery_url(&self) -> Option<&str> {
        self.discovery_url.as_deref().filter(|url| !url.is_empty())
    }
}

impl AttributeSource for ClusterInstance {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::from(self.id)),
            "uuid" => Some(Value::String(self.uuid.clone())),
            "name" => Some(Value::String(self.name.clone())),
            "master_count" => Some(Value::from(self.master_count)),
            "node_count" => Some(Value::from(self.node_count)),
            "discovery_url" => opt_string(&self.discovery_url),
            "api_address" => opt_string(&self.api_address),
            "node_addresses" => Some(Value::from(self.node_addresses.clone())),
            "master_addresses" => Some(Value::from(self.master_addresses.clone())),
            "stack_id" => opt_string(&self.stack_id),
            _ => None,
        }
    }
}

/// Render a scalar output value as a string (strings are taken verbatim)
pub(crate) fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn value_to_list(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(value_to_string).collect(),
        other => value_to_string(other).into_iter().collect(),
    }
}
