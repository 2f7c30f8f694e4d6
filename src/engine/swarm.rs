//! Docker Swarm definition (Fedora Atomic)

use serde_json::Value;

use super::{base_definition, credential_params, EngineKind, TemplateKind};
use crate::cluster::ClusterInstance;
use crate::context::ProvisionContext;
use crate::definition::TemplateDefinition;
use crate::mapping::{ApiAddressOutputMapping, ApiEndpoint, OutputMapping, ParameterMapping};
use crate::stack::TemplateParams;
use crate::Result;

/// Triple served by the Fedora Atomic definition
pub const ATOMIC_TRIPLE: (&str, &str, &str) = ("vm", "fedora-atomic", "swarm");

/// Swarm on Fedora Atomic
pub fn atomic_definition() -> TemplateDefinition {
    let mut def = base_definition(EngineKind::Swarm, TemplateKind::SwarmAtomic, ATOMIC_TRIPLE.into());
    def.add_parameter(ParameterMapping::from_instance("bay_uuid", "uuid"))
        .add_parameter(ParameterMapping::from_instance("number_of_nodes", "node_count"))
        .add_parameter(ParameterMapping::from_profile("master_flavor", "master_flavor_id"))
        .add_parameter(ParameterMapping::from_profile("node_flavor", "flavor_id"))
        .add_parameter(ParameterMapping::from_profile("docker_volume_size", "docker_volume_size"))
        .add_parameter(
            ParameterMapping::from_profile("external_network", "external_network_id").required(),
        )
        .add_parameter(ParameterMapping::from_profile("network_driver", "network_driver"))
        .add_parameter(ParameterMapping::from_profile("tls_disabled", "tls_disabled").required());

    def.add_output(ApiAddressOutputMapping::new(
        "api_address",
        "api_address",
        ApiEndpoint::SWARM,
    ))
    .add_output(OutputMapping::lookup_only("swarm_master_private"))
    .add_output(OutputMapping::new("swarm_master", "master_addresses"))
    .add_output(OutputMapping::lookup_only("swarm_nodes_private"))
    .add_output(OutputMapping::new("swarm_nodes_external", "node_addresses"))
    .add_output(OutputMapping::new("discovery_url", "discovery_url"));
    def
}

/// Inputs computed for Swarm beyond the declared mappings
pub(crate) async fn extra_params(
    ctx: &ProvisionContext<'_>,
    instance: &mut ClusterInstance,
) -> Result<TemplateParams> {
    let mut params = TemplateParams::new();

    if let Some(url) = EngineKind::Swarm
        .discovery_resolver()
        .get_discovery_url(instance, &ctx.config.discovery, ctx.discovery)
        .await?
    {
        params.insert("discovery_url".to_string(), Value::String(url));
    }

    params.extend(credential_params(ctx, ctx.request.auth_url.clone())?);
    Ok(params)
}
