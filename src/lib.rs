//! Stackdef - pluggable template definitions for cluster provisioning
//!
//! A template definition knows how to turn a cluster profile and a cluster
//! instance into the input parameters of a provisioning template, and how to
//! copy the template's reported outputs back onto the cluster instance.
//!
//! # Architecture
//!
//! - A [`DefinitionRegistry`] indexes plugins by the
//!   (infrastructure kind, OS, engine) triple they serve and honors an
//!   operator allow-list
//! - Each [`TemplateDefinition`] is a list of declarative parameter and
//!   output mappings plus an [`EngineKind`] for engine-specific inputs
//! - Engines bootstrap through a [`DiscoveryResolver`] (etcd, swarm token,
//!   or none) whose result is cached on the cluster instance
//!
//! # Modules
//!
//! - [`registry`] - Plugin registration and definition selection
//! - [`definition`] - Template definition and the mapping engine
//! - [`mapping`] - Parameter and output mapping rules
//! - [`engine`] - Kubernetes, Swarm and Mesos definitions
//! - [`discovery`] - Discovery URL resolution
//! - [`cluster`] - Cluster profile and cluster instance
//! - [`stack`] - Template parameters and stack outputs
//! - [`context`] - Identity, service catalog and scale collaborators
//! - [`config`] - Configuration loaded from YAML
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod context;
pub mod definition;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod stack;
pub mod yaml;

pub use cluster::{ClusterInstance, ClusterProfile, DefinitionKey};
pub use config::TemplateConfig;
pub use context::{ProvisionContext, RequestContext, ScaleManager, ServiceCatalog};
pub use definition::TemplateDefinition;
pub use discovery::{DiscoveryClient, DiscoveryResolver, HttpDiscoveryClient};
pub use engine::EngineKind;
pub use error::Error;
pub use mapping::{OutputMapper, OutputMapping, ParameterMapping};
pub use registry::{DefinitionPlugin, DefinitionRegistry};
pub use stack::{StackDefinition, StackOutput, TemplateParams};

/// Result type for stackdef operations
pub type Result<T> = std::result::Result<T, Error>;
