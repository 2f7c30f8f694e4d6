//! Orchestration engines
//!
//! Each engine module builds the [`TemplateDefinition`]s it supports and
//! computes the engine-specific template inputs (discovery URL, credentials,
//! node removal). [`EngineKind`] dispatches to them.

pub mod kubernetes;
pub mod mesos;
pub mod swarm;

use std::fmt;

use serde_json::Value;

use crate::cluster::{ClusterInstance, ClusterProfile, DefinitionKey};
use crate::config::TemplatePaths;
use crate::context::{ProvisionContext, ScaleManager};
use crate::definition::TemplateDefinition;
use crate::discovery::DiscoveryResolver;
use crate::mapping::ParameterMapping;
use crate::stack::TemplateParams;
use crate::Result;

/// Orchestration engine a definition provisions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Kubernetes, bootstrapped through etcd discovery
    Kubernetes,
    /// Docker Swarm, bootstrapped through a swarm token or URL
    Swarm,
    /// Mesos, no discovery
    Mesos,
}

impl EngineKind {
    /// Discovery strategy used by this engine
    pub fn discovery_resolver(&self) -> DiscoveryResolver {
        match self {
            Self::Kubernetes => DiscoveryResolver::Etcd,
            Self::Swarm => DiscoveryResolver::Swarm,
            Self::Mesos => DiscoveryResolver::Static,
        }
    }

    /// Engine-specific template inputs
    ///
    /// These are merged last, so they override mapped and caller-supplied
    /// inputs with the same key.
    pub async fn extra_params(
        &self,
        ctx: &ProvisionContext<'_>,
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
        scale_manager: Option<&dyn ScaleManager>,
    ) -> Result<TemplateParams> {
        match self {
            Self::Kubernetes => kubernetes::extra_params(ctx, profile, instance, scale_manager).await,
            Self::Swarm => swarm::extra_params(ctx, instance).await,
            Self::Mesos => Ok(TemplateParams::new()),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::Swarm => write!(f, "swarm"),
            Self::Mesos => write!(f, "mesos"),
        }
    }
}

/// Template file a definition renders
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateKind {
    /// Kubernetes on Fedora Atomic
    KubernetesAtomic,
    /// Kubernetes on CoreOS
    KubernetesCoreos,
    /// Swarm on Fedora Atomic
    SwarmAtomic,
    /// Mesos on Ubuntu
    MesosUbuntu,
}

impl TemplateKind {
    /// Configured path of this template
    pub fn path<'c>(&self, paths: &'c TemplatePaths) -> &'c str {
        match self {
            Self::KubernetesAtomic => &paths.k8s_atomic,
            Self::KubernetesCoreos => &paths.k8s_coreos,
            Self::SwarmAtomic => &paths.swarm_atomic,
            Self::MesosUbuntu => &paths.mesos_ubuntu,
        }
    }
}

/// Definition pre-loaded with the inputs every engine takes
pub(crate) fn base_definition(
    engine: EngineKind,
    template: TemplateKind,
    provides: DefinitionKey,
) -> TemplateDefinition {
    let mut def = TemplateDefinition::new(engine, template, vec![provides]);
    def.add_parameter(ParameterMapping::from_profile("ssh_key_name", "keypair_id").required())
        .add_parameter(ParameterMapping::from_profile("server_image", "image_id"))
        .add_parameter(ParameterMapping::from_profile("dns_nameserver", "dns_nameserver"))
        .add_parameter(ParameterMapping::from_profile("http_proxy", "http_proxy"))
        .add_parameter(ParameterMapping::from_profile("https_proxy", "https_proxy"))
        .add_parameter(ParameterMapping::from_profile("no_proxy", "no_proxy"))
        .add_parameter(ParameterMapping::from_instance("number_of_masters", "master_count"));
    def
}

/// Inputs carrying the caller's credentials and the provisioning API URL
pub(crate) fn credential_params(
    ctx: &ProvisionContext<'_>,
    auth_url: String,
) -> Result<TemplateParams> {
    let mut params = TemplateParams::new();
    params.insert("auth_url".to_string(), Value::String(auth_url));
    params.insert(
        "user_token".to_string(),
        Value::String(ctx.request.auth_token.clone()),
    );
    params.insert(
        "magnum_url".to_string(),
        Value::String(ctx.catalog.provisioning_url()?),
    );
    Ok(params)
}
