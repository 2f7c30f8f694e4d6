//! Definition registry
//!
//! Plugins are registered explicitly at construction time. Each plugin
//! declares the triples it serves and builds a fresh [`TemplateDefinition`]
//! on demand; the registry indexes plugins by triple and applies the
//! configured allow-list when a definition is requested.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::cluster::DefinitionKey;
use crate::config::TemplateConfig;
use crate::definition::TemplateDefinition;
use crate::engine::{kubernetes, mesos, swarm};
use crate::{Error, Result};

/// A named source of template definitions
pub trait DefinitionPlugin: Send + Sync {
    /// Unique plugin name, matched against the enabled-definitions list
    fn name(&self) -> &str;

    /// Triples the built definition serves
    fn provides(&self) -> Vec<DefinitionKey>;

    /// Build a fresh definition
    fn build(&self) -> TemplateDefinition;
}

/// Plugin backed by a constructor function
#[derive(Clone, Copy)]
pub struct BuiltinPlugin {
    name: &'static str,
    provides: (&'static str, &'static str, &'static str),
    build: fn() -> TemplateDefinition,
}

impl BuiltinPlugin {
    /// Create a plugin serving a single triple
    pub const fn new(
        name: &'static str,
        provides: (&'static str, &'static str, &'static str),
        build: fn() -> TemplateDefinition,
    ) -> Self {
        Self {
            name,
            provides,
            build,
        }
    }
}

impl std::fmt::Debug for BuiltinPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinPlugin")
            .field("name", &self.name)
            .field("provides", &self.provides)
            .finish()
    }
}

impl DefinitionPlugin for BuiltinPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn provides(&self) -> Vec<DefinitionKey> {
        vec![self.provides.into()]
    }

    fn build(&self) -> TemplateDefinition {
        (self.build)()
    }
}

/// Plugins shipped with the crate
pub const BUILTIN_PLUGINS: [BuiltinPlugin; 4] = [
    BuiltinPlugin::new(
        "vm_atomic_k8s",
        kubernetes::ATOMIC_TRIPLE,
        kubernetes::atomic_definition,
    ),
    BuiltinPlugin::new(
        "vm_coreos_k8s",
        kubernetes::COREOS_TRIPLE,
        kubernetes::coreos_definition,
    ),
    BuiltinPlugin::new("vm_atomic_swarm", swarm::ATOMIC_TRIPLE, swarm::atomic_definition),
    BuiltinPlugin::new("vm_ubuntu_mesos", mesos::UBUNTU_TRIPLE, mesos::ubuntu_definition),
];

/// Plugins indexed by triple, then by plugin name
pub type DefinitionIndex<'a> = BTreeMap<DefinitionKey, BTreeMap<String, &'a dyn DefinitionPlugin>>;

/// Registry of definition plugins plus the enabled allow-list
#[derive(Default)]
pub struct DefinitionRegistry {
    plugins: Vec<Box<dyn DefinitionPlugin>>,
    enabled: Vec<String>,
}

impl DefinitionRegistry {
    /// Empty registry with every plugin enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins, all enabled
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.plugins = BUILTIN_PLUGINS
            .iter()
            .map(|p| Box::new(*p) as Box<dyn DefinitionPlugin>)
            .collect();
        registry
    }

    /// Built-in plugins restricted to the configured allow-list
    pub fn from_config(config: &TemplateConfig) -> Self {
        Self::with_builtin().with_enabled(config.enabled_definitions.clone())
    }

    /// Replace the allow-list; an empty list enables every plugin
    pub fn with_enabled(mut self, enabled: Vec<String>) -> Self {
        self.enabled = enabled;
        self
    }

    /// Add a plugin
    ///
    /// Fails if a plugin with the same name is already registered.
    pub fn register<P: DefinitionPlugin + 'static>(&mut self, plugin: P) -> Result<&mut Self> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(Error::config(format!(
                "definition plugin {} registered twice",
                plugin.name()
            )));
        }
        debug!(plugin = %plugin.name(), "registered definition plugin");
        self.plugins.push(Box::new(plugin));
        Ok(self)
    }

    /// Registered plugins as `(name, plugin)` pairs, in registration order
    ///
    /// Never builds a definition.
    pub fn load_definitions(&self) -> impl Iterator<Item = (&str, &dyn DefinitionPlugin)> {
        self.plugins.iter().map(|p| (p.name(), p.as_ref()))
    }

    /// Index every registered plugin by the triples it provides
    pub fn get_definitions(&self) -> DefinitionIndex<'_> {
        let mut index = DefinitionIndex::new();
        for (name, plugin) in self.load_definitions() {
            for key in plugin.provides() {
                index.entry(key).or_default().insert(name.to_string(), plugin);
            }
        }
        index
    }

    /// Configured allow-list; empty means every plugin is enabled
    pub fn enabled_definitions(&self) -> &[String] {
        &self.enabled
    }

    /// Whether the plugin `name` may serve requests
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.is_empty() || self.enabled.iter().any(|e| e == name)
    }

    /// Build the definition serving a triple
    ///
    /// When several enabled plugins serve the triple, the one whose name
    /// sorts first wins. The built definition reports the triples its plugin
    /// declares, which always include the requested one.
    pub fn get_definition(
        &self,
        infra_kind: &str,
        os: &str,
        engine: &str,
    ) -> Result<TemplateDefinition> {
        let key = DefinitionKey::new(infra_kind, os, engine);
        let index = self.get_definitions();
        let candidates = index
            .get(&key)
            .ok_or_else(|| Error::unsupported(infra_kind, os, engine))?;

        let Some((name, plugin)) = candidates.iter().find(|(name, _)| self.is_enabled(name))
        else {
            return Err(Error::not_enabled(
                infra_kind,
                os,
                engine,
                candidates.keys().cloned().collect(),
            ));
        };

        info!(definition = %key, plugin = %name, "selected template definition");
        let mut definition = plugin.build();
        definition.set_provides(plugin.provides());
        Ok(definition)
    }
}
