//! Declarative parameter and output mappings
//!
//! A [`ParameterMapping`] copies one profile or instance attribute into one
//! template input. An [`OutputMapper`] copies one stack output back onto the
//! cluster instance. Missing inputs fail only when a mapping is marked
//! required; missing outputs are always skipped.

use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::cluster::{is_empty_value, value_to_string, AttributeSource, ClusterInstance, ClusterProfile};
use crate::stack::{find_output, StackOutput, TemplateParams};
use crate::{Error, Result};

/// Which object a parameter mapping reads from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Read from the cluster profile
    #[default]
    ClusterProfile,
    /// Read from the cluster instance
    ClusterInstance,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterProfile => write!(f, "cluster profile"),
            Self::ClusterInstance => write!(f, "cluster instance"),
        }
    }
}

/// Rule translating one source attribute into one template input
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterMapping {
    /// Template input key
    pub template_key: String,
    /// Attribute read from the source, if any
    pub source_attr: Option<String>,
    /// Object the attribute is read from
    pub source_kind: SourceKind,
    /// Fail when the source value is empty
    pub required: bool,
    /// Value used when the source value is empty
    pub default: Option<Value>,
}

impl ParameterMapping {
    /// Create a mapping with no source attribute
    pub fn new(template_key: impl Into<String>) -> Self {
        Self {
            template_key: template_key.into(),
            source_attr: None,
            source_kind: SourceKind::ClusterProfile,
            required: false,
            default: None,
        }
    }

    /// Map a cluster profile attribute
    pub fn from_profile(template_key: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            source_attr: Some(attr.into()),
            ..Self::new(template_key)
        }
    }

    /// Map a cluster instance attribute
    pub fn from_instance(template_key: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            source_attr: Some(attr.into()),
            source_kind: SourceKind::ClusterInstance,
            ..Self::new(template_key)
        }
    }

    /// Mark the mapping as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fall back to `default` when the source value is empty
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Resolve the value for this mapping
    ///
    /// Returns `Ok(None)` when the source is empty, the mapping is optional
    /// and no default is configured. Values pass through unmodified.
    pub fn resolve(
        &self,
        profile: &ClusterProfile,
        instance: &ClusterInstance,
    ) -> Result<Option<Value>> {
        let value = self
            .source_attr
            .as_deref()
            .and_then(|attr| match self.source_kind {
                SourceKind::ClusterProfile => profile.attribute(attr),
                SourceKind::ClusterInstance => instance.attribute(attr),
            })
            .filter(|v| !is_empty_value(v));

        match value {
            Some(v) => Ok(Some(v)),
            None if self.required => Err(Error::required_parameter(&self.template_key)),
            None => Ok(self.default.clone()),
        }
    }

    /// Resolve this mapping into `params`, leaving the key out when nothing resolved
    pub fn set_param(
        &self,
        params: &mut TemplateParams,
        profile: &ClusterProfile,
        instance: &ClusterInstance,
    ) -> Result<()> {
        if let Some(value) = self.resolve(profile, instance)? {
            params.insert(self.template_key.clone(), value);
        }
        Ok(())
    }
}

/// Rule applying one stack output to the cluster instance
///
/// Implement this to post-process an output before it is stored; register
/// it on a definition with `TemplateDefinition::add_output`.
pub trait OutputMapper: fmt::Debug + Send + Sync {
    /// Stack output key this mapper reads
    fn output_key(&self) -> &str;

    /// Instance attribute this mapper writes, if any
    fn target_attr(&self) -> Option<&str>;

    /// Value of this mapper's output in `outputs` (first match wins)
    fn get_output_value<'a>(&self, outputs: &'a [StackOutput]) -> Option<&'a Value> {
        find_output(outputs, self.output_key())
    }

    /// Apply the output to `instance`; absent outputs leave it untouched
    fn set_output(
        &self,
        outputs: &[StackOutput],
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
    ) -> Result<()>;
}

/// Output mapping that copies the value verbatim
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputMapping {
    /// Stack output key
    pub output_key: String,
    /// Instance attribute written, or `None` for lookup-only outputs
    pub target_attr: Option<String>,
}

impl OutputMapping {
    /// Map an output onto an instance attribute
    pub fn new(output_key: impl Into<String>, target_attr: impl Into<String>) -> Self {
        Self {
            output_key: output_key.into(),
            target_attr: Some(target_attr.into()),
        }
    }

    /// Declare an output that is only looked up, never stored
    pub fn lookup_only(output_key: impl Into<String>) -> Self {
        Self {
            output_key: output_key.into(),
            target_attr: None,
        }
    }
}

impl OutputMapper for OutputMapping {
    fn output_key(&self) -> &str {
        &self.output_key
    }

    fn target_attr(&self) -> Option<&str> {
        self.target_attr.as_deref()
    }

    fn set_output(
        &self,
        outputs: &[StackOutput],
        _profile: &ClusterProfile,
        instance: &mut ClusterInstance,
    ) -> Result<()> {
        let Some(target) = self.target_attr.as_deref() else {
            return Ok(());
        };
        match self.get_output_value(outputs) {
            Some(value) => {
                debug!(output = %self.output_key, attr = %target, "applying stack output");
                instance.set_attribute(target, value.clone())
            }
            None => Ok(()),
        }
    }
}

/// Scheme and port for an engine API, by TLS setting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiEndpoint {
    /// Scheme when TLS is enabled
    pub secure_scheme: &'static str,
    /// Port when TLS is enabled
    pub secure_port: u16,
    /// Scheme when TLS is disabled
    pub insecure_scheme: &'static str,
    /// Port when TLS is disabled
    pub insecure_port: u16,
}

impl ApiEndpoint {
    /// Kubernetes API server
    pub const KUBERNETES: Self = Self {
        secure_scheme: "https",
        secure_port: 6443,
        insecure_scheme: "http",
        insecure_port: 8080,
    };

    /// Docker Swarm manager
    pub const SWARM: Self = Self {
        secure_scheme: "https",
        secure_port: 2376,
        insecure_scheme: "tcp",
        insecure_port: 2376,
    };

    /// Compose `<scheme>://<address>:<port>` for the profile's TLS setting
    pub fn format(&self, address: &str, tls_disabled: bool) -> String {
        let (scheme, port) = if tls_disabled {
            (self.insecure_scheme, self.insecure_port)
        } else {
            (self.secure_scheme, self.secure_port)
        };
        format!("{scheme}://{address}:{port}")
    }
}

/// Output mapping that turns a bare API address into a full endpoint URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiAddressOutputMapping {
    inner: OutputMapping,
    endpoint: ApiEndpoint,
}

impl ApiAddressOutputMapping {
    /// Map `output_key` onto `target_attr`, composing the URL with `endpoint`
    pub fn new(
        output_key: impl Into<String>,
        target_attr: impl Into<String>,
        endpoint: ApiEndpoint,
    ) -> Self {
        Self {
            inner: OutputMapping::new(output_key, target_attr),
            endpoint,
        }
    }
}

impl OutputMapper for ApiAddressOutputMapping {
    fn output_key(&self) -> &str {
        self.inner.output_key()
    }

    fn target_attr(&self) -> Option<&str> {
        self.inner.target_attr()
    }

    fn set_output(
        &self,
        outputs: &[StackOutput],
        profile: &ClusterProfile,
        instance: &mut ClusterInstance,
    ) -> Result<()> {
        let (Some(target), Some(value)) = (self.target_attr(), self.get_output_value(outputs))
        else {
            return Ok(());
        };
        let Some(address) = value_to_string(value.clone()) else {
            return Ok(());
        };
        let url = self.endpoint.format(&address, profile.tls_disabled);
        debug!(output = %self.output_key(), attr = %target, url = %url, "applying api address");
        instance.set_attribute(target, Value::String(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> ClusterProfile {
        ClusterProfile {
            keypair_id: Some("default".to_string()),
            ..Default::default()
        }
    }

    fn instance() -> ClusterInstance {
        ClusterInstance {
            uuid: "bay-xx-xx-xx-xx".to_string(),
            master_count: 3,
            ..Default::default()
        }
    }

    // ==========================================================================
    // Story: Parameter resolution
    // ==========================================================================

    #[test]
    fn test_required_param_not_set_fails() {
        let param = ParameterMapping::from_profile("test", "image_id").required();
        let mut params = TemplateParams::new();

        let err = param.set_param(&mut params, &profile(), &instance()).unwrap_err();
        match err {
            Error::RequiredParameterMissing { template_key } => assert_eq!(template_key, "test"),
            other => panic!("expected RequiredParameterMissing, got {other:?}"),
        }
        assert!(params.is_empty());
    }

    #[test]
    fn test_required_param_with_empty_string_fails() {
        let profile = ClusterProfile {
            image_id: Some(String::new()),
            ..profile()
        };
        let param = ParameterMapping::from_profile("server_image", "image_id").required();
        assert!(param.resolve(&profile, &instance()).is_err());
    }

    #[test]
    fn test_required_param_ignores_default() {
        let param = ParameterMapping::from_profile("server_image", "image_id")
            .required()
            .with_default("fedora");
        assert!(param.resolve(&profile(), &instance()).is_err());
    }

    #[test]
    fn test_optional_param_falls_back_to_default() {
        let param = ParameterMapping::from_profile("network_driver", "network_driver")
            .with_default("flannel");
        assert_eq!(
            param.resolve(&profile(), &instance()).unwrap(),
            Some(json!("flannel"))
        );
    }

    #[test]
    fn test_optional_param_without_default_is_omitted() {
        let param = ParameterMapping::from_profile("http_proxy", "http_proxy");
        let mut params = TemplateParams::new();
        param.set_param(&mut params, &profile(), &instance()).unwrap();
        assert!(!params.contains_key("http_proxy"));
    }

    #[test]
    fn test_instance_params_pass_through_unmodified() {
        let param = ParameterMapping::from_instance("number_of_masters", "master_count");
        assert_eq!(
            param.resolve(&profile(), &instance()).unwrap(),
            Some(json!(3))
        );
    }

    #[test]
    fn test_false_flag_satisfies_required() {
        let param = ParameterMapping::from_profile("tls_disabled", "tls_disabled").required();
        assert_eq!(
            param.resolve(&profile(), &instance()).unwrap(),
            Some(json!(false))
        );
    }

    #[test]
    fn test_mapping_without_source_uses_default() {
        let param = ParameterMapping::new("fixed_port").with_default(2379);
        assert_eq!(param.resolve(&profile(), &instance()).unwrap(), Some(json!(2379)));
    }

    // ==========================================================================
    // Story: Output application
    // ==========================================================================

    fn outputs() -> Vec<StackOutput> {
        vec![
            StackOutput::new("key1", "value1"),
            StackOutput::new("key2", json!(["value2", "value3"])),
        ]
    }

    #[test]
    fn test_output_mapping_reads_scalar_list_and_missing() {
        let outputs = outputs();
        assert_eq!(
            OutputMapping::lookup_only("key1").get_output_value(&outputs),
            Some(&json!("value1"))
        );
        assert_eq!(
            OutputMapping::lookup_only("key2").get_output_value(&outputs),
            Some(&json!(["value2", "value3"]))
        );
        assert_eq!(OutputMapping::lookup_only("key3").get_output_value(&outputs), None);
    }

    #[test]
    fn test_missing_output_leaves_attribute_untouched() {
        let mut instance = ClusterInstance {
            node_addresses: vec!["10.0.0.9".to_string()],
            ..instance()
        };
        OutputMapping::new("kube_minions_external", "node_addresses")
            .set_output(&outputs(), &profile(), &mut instance)
            .unwrap();
        assert_eq!(instance.node_addresses, vec!["10.0.0.9"]);
    }

    #[test]
    fn test_lookup_only_mapping_never_writes() {
        let mut instance = instance();
        let before = instance.clone();
        OutputMapping::lookup_only("key2")
            .set_output(&outputs(), &profile(), &mut instance)
            .unwrap();
        assert_eq!(instance, before);
    }

    #[test]
    fn test_api_endpoint_formats_by_tls_setting() {
        assert_eq!(
            ApiEndpoint::KUBERNETES.format("updated_address", true),
            "http://updated_address:8080"
        );
        assert_eq!(
            ApiEndpoint::KUBERNETES.format("updated_address", false),
            "https://updated_address:6443"
        );
        assert_eq!(ApiEndpoint::SWARM.format("10.0.0.5", true), "tcp://10.0.0.5:2376");
    }

    #[test]
    fn test_api_address_mapping_is_idempotent() {
        let outputs = vec![StackOutput::new("api_address", "updated_address")];
        let mapping =
            ApiAddressOutputMapping::new("api_address", "api_address", ApiEndpoint::KUBERNETES);
        let mut instance = instance();

        mapping.set_output(&outputs, &profile(), &mut instance).unwrap();
        let once = instance.clone();
        mapping.set_output(&outputs, &profile(), &mut instance).unwrap();

        assert_eq!(instance, once);
        assert_eq!(instance.api_address.as_deref(), Some("https://updated_address:6443"));
    }
}
