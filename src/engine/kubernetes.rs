//! Kubernetes definitions (Fedora Atomic and CoreOS)

use serde_json::Value;
use tracing::debug;

use super::{base_definition, credential_params, EngineKind, TemplateKind};
use crate::cluster::{ClusterInstance, ClusterProfile, DefinitionKey};
use crate::context::{ProvisionContext, ScaleManager};
use crate::definition::TemplateDefinition;
use crate::mapping::{ApiAddressOutputMapping, ApiEndpoint, OutputMapping, ParameterMapping};
use crate::stack::TemplateParams;
use crate::Result;

/// Stack output listing worker hosts, consulted when scaling down
pub const MINIONS_OUTPUT: &str = "kube_minions";

/// Labels passed straight through as template inputs when set
pub const FLANNEL_LABELS: [&str; 3] = [
    "flannel_network_cidr",
    "flannel_use_vxlan",
    "flannel_network_subnetlen",
];

/// Triple served by the Fedora Atomic definition
pub const ATOMIC_TRIPLE: (&str, &str, &str) = ("vm", "fedora-atomic", "kubernetes");

/// Triple served by the CoreOS definition
pub const COREOS_TRIPLE: (&str, &str, &str) = ("vm", "coreos", "kubernetes");

/// Insecure API port used when TLS is disabled
pub const INSECURE_API_PORT: u16 = 8080;

/// Kubernetes on Fedora Atomic
pub fn atomic_definition() -> TemplateDefinition {
    kubernetes_definition(TemplateKind::KubernetesAtomic, ATOMIC_TRIPLE.into())
}

/// Kubernetes on CoreOS
pub fn coreos_definition() -> TemplateDefinition {
    kubernetes_definition(TemplateKind::KubernetesCoreos, COREOS_TRIPLE.into())
}

fn kubernetes_definition(template: TemplateKind, provides: DefinitionKey) -> TemplateDefinition {
    let mut def = base_definition(EngineKind::Kubernetes, template, provides);
    def.add_parameter(ParameterMapping::from_profile("master_flavor", "master_flavor_id"))
        .add_parameter(ParameterMapping::from_profile("minion_flavor", "flavor_id"))
        .add_parameter(ParameterMapping::from_instance("number_of_minions", "node_count"))
        .add_parameter(ParameterMapping::from_profile("docker_volume_size", "docker_volume_size"))
        .add_parameter(
            ParameterMapping::from_profile("external_network", "external_network_id").required(),
        )
        .add_parameter(ParameterMapping::from_profile("network_driver", "network_driver"))
        .add_parameter(ParameterMapping::from_profile("tls_disabled", "tls_disabled").required())
        .add_parameter(ParameterMapping::from_profile("registry_enabled", "registry_enabled"))
        .add_parameter(ParameterMapping::from_instance("bay_uuid", "uuid"));

    def.add_output(ApiAddressOutputMapping::new(
        "api_address",
        "api_address",
        ApiEndpoint::KUBERNETES,
    ))
    .add_output(OutputMapping::lookup_only(MINIONS_OUTPUT))
    .add_output(OutputMapping::new("kube_minions_external", "node_addresses"))
    .add_output(OutputMapping::new("kube_masters", "master_addresses"));
    def
}

/// Inputs computed for Kubernetes beyond the declared mappings
pub(crate) async fn extra_params(
    ctx: &ProvisionContext<'_>,
    profile: &ClusterProfile,
    instance: &mut ClusterInstance,
    scale_manager: Option<&dyn ScaleManager>,
) -> Result<TemplateParams> {
    let mut params = TemplateParams::new();

    if let Some(url) = EngineKind::Kubernetes
        .discovery_resolver()
        .get_discovery_url(instance, &ctx.config.discovery, ctx.discovery)
        .await?
    {
        params.insert("discovery_url".to_string(), Value::String(url));
    }

    if let Some(manager) = scale_manager {
        let nodes = manager.get_removal_nodes(MINIONS_OUTPUT);
        debug!(cluster = %instance.uuid, count = nodes.len(), "minions slated for removal");
        params.insert("minions_to_remove".to_string(), Value::from(nodes));
    }

    for label in FLANNEL_LABELS {
        if let Some(value) = profile.label(label) {
            params.insert(label.to_string(), Value::String(value.to_string()));
        }
    }

    // Templates only speak the v2 identity API
    params.extend(credential_params(ctx, ctx.request.auth_url.replace("v3", "v2"))?);
    params.insert(
        "username".to_string(),
        Value::String(ctx.request.user_name.clone()),
    );
    params.insert(
        "tenant_name".to_string(),
        Value::String(ctx.request.tenant.clone()),
    );

    if profile.tls_disabled {
        params.insert(
            "loadbalancing_protocol".to_string(),
            Value::String("HTTP".to_string()),
        );
        params.insert("kubernetes_port".to_string(), Value::from(INSECURE_API_PORT));
    }

    Ok(params)
}
