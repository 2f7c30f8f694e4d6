//! Provisioning stack input/output contract
//!
//! The provisioning engine consumes a flat map of template parameters and
//! reports a list of named outputs once the stack is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Template input parameters, keyed by template input name
pub type TemplateParams = BTreeMap<String, Value>;

/// One output record reported by the provisioning engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output name declared by the template
    pub output_key: String,
    /// Output value (scalar or list)
    pub output_value: Value,
    /// Human readable description
    #[serde(default)]
    pub description: String,
}

impl StackOutput {
    /// Create an output record with the engine's default description
    pub fn new(output_key: impl Into<String>, output_value: impl Into<Value>) -> Self {
        Self {
            output_key: output_key.into(),
            output_value: output_value.into(),
            description: "No description given".to_string(),
        }
    }
}

/// Find the value of the first output with the given key
pub fn find_output<'a>(outputs: &'a [StackOutput], output_key: &str) -> Option<&'a Value> {
    outputs
        .iter()
        .find(|o| o.output_key == output_key)
        .map(|o| &o.output_value)
}

/// Everything the provisioning engine needs to create a stack
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StackDefinition {
    /// Path of the template file
    pub template_path: String,
    /// Template input parameters
    pub params: TemplateParams,
}
