//! Mesos definition (Ubuntu)

use super::{base_definition, EngineKind, TemplateKind};
use crate::definition::TemplateDefinition;
use crate::mapping::{OutputMapping, ParameterMapping};

/// Triple served by the Ubuntu definition
pub const UBUNTU_TRIPLE: (&str, &str, &str) = ("vm", "ubuntu", "mesos");

/// Mesos on Ubuntu
///
/// Mesos needs no discovery service and no engine-specific inputs.
pub fn ubuntu_definition() -> TemplateDefinition {
    let mut def = base_definition(EngineKind::Mesos, TemplateKind::MesosUbuntu, UBUNTU_TRIPLE.into());
    def.add_parameter(
        ParameterMapping::from_profile("external_network", "external_network_id").required(),
    )
    .add_parameter(ParameterMapping::from_instance("number_of_slaves", "node_count"))
    .add_parameter(ParameterMapping::from_profile("master_flavor", "master_flavor_id"))
    .add_parameter(ParameterMapping::from_profile("slave_flavor", "flavor_id"))
    .add_parameter(ParameterMapping::from_instance("cluster_name", "name"));

    def.add_output(OutputMapping::new("api_address", "api_address"))
        .add_output(OutputMapping::lookup_only("mesos_master_private"))
        .add_output(OutputMapping::new("mesos_master", "master_addresses"))
        .add_output(OutputMapping::lookup_only("mesos_slaves_private"))
        .add_output(OutputMapping::new("mesos_slaves", "node_addresses"));
    def
}
