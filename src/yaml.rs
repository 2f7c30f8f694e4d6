//! YAML loading for configuration, cluster fixtures and stack outputs
//!
//! Parses with yaml-rust2, converts to `serde_json::Value`, then
//! deserializes into the typed structure with serde.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::{Error, Result};

/// Parse a YAML string into a `serde_json::Value`
///
/// Only the first document is used. Empty input yields `Value::Null`.
pub fn parse_yaml(input: &str) -> Result<Value> {
    let docs = YamlLoader::load_from_str(input).map_err(|e| Error::serialization(e.to_string()))?;
    match docs.into_iter().next() {
        Some(doc) => yaml_to_json(doc),
        None => Ok(Value::Null),
    }
}

/// Parse YAML and deserialize it into `T`
///
/// Empty input deserializes from an empty mapping so that types with
/// `#[serde(default)]` fall back to their defaults.
pub fn from_yaml_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    let value = match parse_yaml(input)? {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

/// Parse YAML into `T`, yielding `T::default()` for an empty document
///
/// Use this for documents whose top level is a list, such as stack
/// outputs, where an empty mapping would not deserialize.
pub fn from_yaml_str_or_default<T: DeserializeOwned + Default>(input: &str) -> Result<T> {
    match parse_yaml(input)? {
        Value::Null => Ok(T::default()),
        value => Ok(serde_json::from_value(value)?),
    }
}

/// Read a YAML file and deserialize it into `T`
pub fn from_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    from_yaml_str(&read_file(path)?)
}

/// Read a YAML file into `T`, yielding `T::default()` when it is empty
pub fn from_yaml_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    from_yaml_str_or_default(&read_file(path)?)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))
}

fn yaml_to_json(yaml: Yaml) -> Result<Value> {
    match yaml {
        Yaml::Null => Ok(Value::Null),
        Yaml::Boolean(b) => Ok(Value::Bool(b)),
        Yaml::Integer(i) => Ok(Value::from(i)),
        Yaml::Real(text) => real_to_json(&text),
        Yaml::String(s) => Ok(Value::String(s)),
        Yaml::Array(items) => items
            .into_iter()
            .map(yaml_to_json)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Yaml::Hash(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (key, value) in entries {
                object.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Ok(Value::Object(object))
        }
        Yaml::Alias(_) => Err(Error::serialization("YAML aliases not supported")),
        Yaml::BadValue => Err(Error::serialization("bad YAML value")),
    }
}

fn real_to_json(text: &str) -> Result<Value> {
    let f: f64 = text
        .parse()
        .map_err(|e| Error::serialization(format!("invalid number {text}: {e}")))?;
    Ok(Number::from_f64(f).map_or(Value::Null, Value::Number))
}

/// Mapping keys name profile fields, instance fields or labels
///
/// Scalar keys keep their source text, so a label such as `8080: web`
/// survives as `"8080"`. A null key cannot name anything and is rejected.
fn mapping_key(key: Yaml) -> Result<String> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Err(Error::serialization("YAML mapping key must not be null")),
        other => Err(Error::serialization(format!(
            "YAML mapping key must be a scalar, got {other:?}"
        ))),
    }
}
