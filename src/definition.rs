//! Template definitions
//!
//! A [`TemplateDefinition`] pairs a provisioning template with the mappings
//! that fill its inputs and read back its outputs. Engine-specific behavior
//! (extra inputs, discovery, output post-processing) comes from the
//! definition's [`EngineKind`] and from the output mappers registered on it,
//! so every definition shares the same mapping engine.

use serde_json::Value;
use tracing::debug;

use crate::cluster::{ClusterInstance, ClusterProfile, DefinitionKey};
use crate::config::TemplateConfig;
use crate::context::{ProvisionContext, ScaleManager};
use crate::discovery::DiscoveryResolver;
use crate::engine::{EngineKind, TemplateKind};
use crate::mapping::{OutputMapper, ParameterMapping, SourceKind};
use crate::stack::{StackDefinition, StackOutput, TemplateParams};
use crate::{Error, Result};

/// Parameter/output wiring for one provisioning template
#[derive(Debug)]
pub struct TemplateDefinition {
    provides: Vec<DefinitionKey>,
    engine: EngineKind,
    template: TemplateKind,
    param_mappings: Vec<ParameterMapping>,
    output_mappings: Vec<Box<dyn OutputMapper>>,
}

impl TemplateDefinition {
    /// Create an empty definition for `engine` rendering `template`
    pub fn new(engine: EngineKind, template: TemplateKind, provides: Vec<DefinitionKey>) -> Self {
        Self {
            provides,
            engine,
            template,
            param_mappings: Vec::new(),
            output_mappings: Vec::new(),
        }
    }

    /// Triples this definition serves
    pub fn provides(&self) -> &[DefinitionKey] {
        &self.provides
    }

    /// Replace the served triples
    ///
    /// The registry stamps the declaring plugin's triples onto every
    /// definition it builds, so a definition reused across triples reports
    /// the one it was selected for.
    pub fn set_provides(&mut self, provides: Vec<DefinitionKey>) {
        self.provides = provides;
    }

    /// Engine strategy
    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    /// Discovery strategy used by `get_discovery_url`
    pub fn discovery_resolver(&self) -> DiscoveryResolver {
        self.engine.discovery_resolver()
    }

    /// Registered parameter mappings, in registration order
    pub fn param_mappings(&self) -> &[ParameterMapping] {
        &self.param_mappings
    }

    /// Registered output mappers, in registration order
    pub fn output_mappings(&self) -> &[Box<dyn OutputMapper>] {
        &self.output_mappings
    }

    /// Register a parameter mapping
    pub fn add_parameter(&mut self, mapping: ParameterMapping) -> &mut Self {
        self.param_mappings.push(mapping);
        self
    }

    /// Register an output mapper
    ///
    /// Any [`OutputMapper`] works, so engines can post-process outputs
    /// without the definition knowing about it.
    pub fn add_output<M: OutputMapper + 'static>(&mut self, mapping: M) -> &mut Self {
        self.output_mappings.push(Box::new(mapping));
        self
    }

    /// Look up the output mapper registered for `output_key`
    pub fn get_output(&self, output_key: &str) -> Option<&dyn OutputMapper> {
        self.output_mappings
            .iter()
            .find(|m| m.output_key() == output_key)
            .map(|m| m.as_ref())
    }

    /// Template input key fed from a cluster instance attribute
    pub fn get_heat_param(&self, instance_attr: &str) -> Result<&str> {
        self.get_heat_param_for(SourceKind::ClusterInstance, instance_attr)
    }

    /// Template input key fed from `attr` on the given source
    pub fn get_heat_param_for(&self, kind: SourceKind, attr: &str) -> Result<&str> {
        self.param_mappings
            .iter()
            .find(|m| m.source_kind == kind && m.source_attr.as_deref() == Some(attr))
            .map(|m| m.template_key.as_str())
            .ok_or_else(|| Error::attribute_lookup(attr, format!("{kind} parameter mappings")))
    }

    /// Resolve every parameter mapping, then overlay `extra_params`
    ///
    /// Extra params win on key collisions.
    pub fn build_params(
        &self,
        profile: &ClusterProfile,
        instance: &ClusterInstance,
        extra_params: TemplateParams,
    ) -> Result<TemplateParams> {
        let mut params = TemplateParams::new();
        for mapping in &self.param_mappings {
            mapping.set_param(&mut params, profile, instance)?;
        }
        params.extend(extra_params);
        Ok(params)
    }

    /// Build the template input map for a cluster
    ///
    /// Mapped attributes come first, then the caller's `extra_params`, then
    /// the engine's own extras (discovery URL, credentials, node removal).
    /// Required mappings are checked before any discovery call is made.
    pub async fn get_params(
        &self,
        ctx: &ProvisionContext<'_>,
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
        extra_params: Option<TemplateParams>,
        scale_manager: Option<&dyn ScaleManager>,
    ) -> Result<TemplateParams> {
        let mut params = self.build_params(profile, instance, extra_params.unwrap_or_default())?;

        let engine_params = self
            .engine
            .extra_params(ctx, profile, instance, scale_manager)
            .await?;
        params.extend(engine_params);

        debug!(
            engine = %self.engine,
            cluster = %instance.uuid,
            params = params.len(),
            "built template parameters"
        );
        Ok(params)
    }

    /// Resolve the bootstrap discovery URL through this engine's resolver
    pub async fn get_discovery_url(
        &self,
        ctx: &ProvisionContext<'_>,
        instance: &mut ClusterInstance,
    ) -> Result<Option<String>> {
        self.discovery_resolver()
            .get_discovery_url(instance, &ctx.config.discovery, ctx.discovery)
            .await
    }

    /// Apply reported stack outputs to the cluster instance
    ///
    /// Outputs that are not reported leave their attributes untouched.
    pub fn update_outputs(
        &self,
        outputs: &[StackOutput],
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
    ) -> Result<()> {
        for mapping in &self.output_mappings {
            mapping.set_output(outputs, profile, instance)?;
        }
        Ok(())
    }

    /// Value reported for `output_key`, through its registered mapper
    pub fn output_value<'a>(&self, outputs: &'a [StackOutput], output_key: &str) -> Option<&'a Value> {
        self.get_output(output_key)?.get_output_value(outputs)
    }

    /// Configured template file for this definition
    pub fn template_path<'c>(&self, config: &'c TemplateConfig) -> &'c str {
        self.template.path(&config.templates)
    }

    /// Template path and input map for creating or updating the stack
    pub async fn extract_definition(
        &self,
        ctx: &ProvisionContext<'_>,
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
        scale_manager: Option<&dyn ScaleManager>,
    ) -> Result<StackDefinition> {
        let params = self
            .get_params(ctx, profile, instance, None, scale_manager)
            .await?;
        Ok(StackDefinition {
            template_path: self.template_path(ctx.config).to_string(),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MockServiceCatalog, RequestContext};
    use crate::discovery::MockDiscoveryClient;
    use crate::mapping::{ApiAddressOutputMapping, ApiEndpoint, OutputMapping};
    use serde_json::json;

    fn mesos_like() -> TemplateDefinition {
        let mut def = TemplateDefinition::new(
            EngineKind::Mesos,
            TemplateKind::MesosUbuntu,
            vec![DefinitionKey::new("vm", "ubuntu", "mesos")],
        );
        def.add_parameter(ParameterMapping::from_profile("ssh_key_name", "keypair_id").required())
            .add_parameter(ParameterMapping::from_instance("number_of_slaves", "node_count"))
            .add_parameter(ParameterMapping::from_profile("slave_flavor", "flavor_id"))
            .add_parameter(
                ParameterMapping::from_profile("network_driver", "network_driver")
                    .with_default("docker"),
            );
        def.add_output(OutputMapping::new("api_address", "api_address"))
            .add_output(OutputMapping::lookup_only("mesos_slaves_private"))
            .add_output(OutputMapping::new("mesos_slaves", "node_addresses"));
        def
    }

    fn profile() -> ClusterProfile {
        ClusterProfile {
            keypair_id: Some("default".to_string()),
            flavor_id: Some("m1.small".to_string()),
            ..Default::default()
        }
    }

    fn instance() -> ClusterInstance {
        ClusterInstance {
            id: 1,
            uuid: "bay-xx".to_string(),
            node_count: 2,
            ..Default::default()
        }
    }

    // ==========================================================================
    // Story: Building template inputs
    // ==========================================================================

    #[test]
    fn test_build_params_resolves_every_mapping() {
        let params = mesos_like()
            .build_params(&profile(), &instance(), TemplateParams::new())
            .unwrap();

        assert_eq!(params["ssh_key_name"], json!("default"));
        assert_eq!(params["number_of_slaves"], json!(2));
        assert_eq!(params["slave_flavor"], json!("m1.small"));
        assert_eq!(params["network_driver"], json!("docker"));
    }

    #[test]
    fn test_extra_params_win_over_mappings() {
        let mut extra = TemplateParams::new();
        extra.insert("slave_flavor".to_string(), json!("m1.large"));
        extra.insert("feature_flag".to_string(), json!(true));

        let params = mesos_like().build_params(&profile(), &instance(), extra).unwrap();
        assert_eq!(params["slave_flavor"], json!("m1.large"));
        assert_eq!(params["feature_flag"], json!(true));
    }

    #[test]
    fn test_missing_required_parameter_stops_the_build() {
        let profile = ClusterProfile::default();
        let err = mesos_like()
            .build_params(&profile, &instance(), TemplateParams::new())
            .unwrap_err();
        assert!(matches!(err, Error::RequiredParameterMissing { .. }));
    }

    #[tokio::test]
    async fn test_get_params_without_engine_extras() {
        let request = RequestContext::default();
        let catalog = MockServiceCatalog::new();
        let discovery = MockDiscoveryClient::new();
        let config = TemplateConfig::default();
        let ctx = ProvisionContext::new(&request, &catalog, &discovery, &config);

        let mut instance = instance();
        let params = mesos_like()
            .get_params(&ctx, &profile(), &mut instance, None, None)
            .await
            .unwrap();
        assert_eq!(params.len(), 4);
        assert!(instance.discovery_url.is_none());
    }

    #[tokio::test]
    async fn test_extract_definition_pairs_template_and_params() {
        let request = RequestContext::default();
        let catalog = MockServiceCatalog::new();
        let discovery = MockDiscoveryClient::new();
        let mut config = TemplateConfig::default();
        config.templates.mesos_ubuntu = "/srv/mesos.yaml".to_string();
        let ctx = ProvisionContext::new(&request, &catalog, &discovery, &config);

        let stack = mesos_like()
            .extract_definition(&ctx, &profile(), &mut instance(), None)
            .await
            .unwrap();
        assert_eq!(stack.template_path, "/srv/mesos.yaml");
        assert_eq!(stack.params["ssh_key_name"], json!("default"));
    }

    // ==========================================================================
    // Story: Reverse lookup of template inputs
    // ==========================================================================

    #[test]
    fn test_get_heat_param_finds_instance_mapping() {
        assert_eq!(mesos_like().get_heat_param("node_count").unwrap(), "number_of_slaves");
    }

    #[test]
    fn test_get_heat_param_for_profile_attribute() {
        assert_eq!(
            mesos_like()
                .get_heat_param_for(SourceKind::ClusterProfile, "flavor_id")
                .unwrap(),
            "slave_flavor"
        );
    }

    #[test]
    fn test_get_heat_param_unknown_attribute_fails() {
        let def = mesos_like();
        let err = def.get_heat_param("flavor_id").unwrap_err();
        assert!(matches!(err, Error::AttributeLookup { .. }));
        assert!(def.get_heat_param("no_such_attr").is_err());
    }

    // ==========================================================================
    // Story: Applying stack outputs
    // ==========================================================================

    #[test]
    fn test_add_output_accepts_custom_mappers() {
        let mut def = mesos_like();
        def.add_output(ApiAddressOutputMapping::new(
            "swarm_api",
            "api_address",
            ApiEndpoint::SWARM,
        ));

        let mapper = def.get_output("swarm_api").expect("mapper registered");
        assert_eq!(mapper.target_attr(), Some("api_address"));
        assert_eq!(def.output_mappings().len(), 4);
    }

    #[test]
    fn test_update_outputs_applies_present_and_skips_missing() {
        let def = mesos_like();
        let outputs = vec![
            StackOutput::new("mesos_slaves", json!(["10.0.0.4", "10.0.0.5"])),
            StackOutput::new("mesos_slaves_private", json!(["192.168.0.4"])),
        ];
        let mut instance = ClusterInstance {
            api_address: Some("10.0.0.1".to_string()),
            ..instance()
        };

        def.update_outputs(&outputs, &profile(), &mut instance).unwrap();

        assert_eq!(instance.node_addresses, vec!["10.0.0.4", "10.0.0.5"]);
        assert_eq!(instance.api_address.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_update_outputs_twice_is_idempotent() {
        let def = mesos_like();
        let outputs = vec![
            StackOutput::new("api_address", "10.0.0.2"),
            StackOutput::new("mesos_slaves", json!(["10.0.0.4"])),
        ];
        let mut instance = instance();

        def.update_outputs(&outputs, &profile(), &mut instance).unwrap();
        let once = instance.clone();
        def.update_outputs(&outputs, &profile(), &mut instance).unwrap();
        assert_eq!(instance, once);
    }

    #[test]
    fn test_output_value_reads_through_registered_mapper() {
        let def = mesos_like();
        let outputs = vec![StackOutput::new("mesos_slaves_private", json!(["192.168.0.4"]))];
        assert_eq!(
            def.output_value(&outputs, "mesos_slaves_private"),
            Some(&json!(["192.168.0.4"]))
        );
        assert_eq!(def.output_value(&outputs, "unregistered"), None);
    }
}
