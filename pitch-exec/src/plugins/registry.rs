use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::context::Phase;
use crate::plugins::{builtin, Plugin, PluginArgs, PluginError};

pub type PluginFactory =
    Arc<dyn Fn(PluginArgs) -> Result<Box<dyn Plugin>, PluginError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    pub name: String,
    /// Rendered default, `None` when the argument is required or open-ended.
    pub default: Option<String>,
}

impl ArgumentSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), default: None }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self { name: name.into(), default: Some(default.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub phase: Phase,
    pub description: String,
    pub arguments: Vec<ArgumentSpec>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>, phase: Phase, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase,
            description: description.into(),
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, spec: ArgumentSpec) -> Self {
        self.arguments.push(spec);
        self
    }

    /// `name(a, b=default)`
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|a| match &a.default {
                Some(d) => format!("{}={}", a.name, d),
                None => a.name.clone(),
            })
            .collect();
        format!("{}({})", self.name, args.join(", "))
    }
}

#[derive(Clone)]
struct RegisteredPlugin {
    descriptor: PluginDescriptor,
    factory: PluginFactory,
}

/// Explicit `phase -> name -> factory` table, filled at startup.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    phases: BTreeMap<Phase, BTreeMap<String, RegisteredPlugin>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (phase, plugins) in &self.phases {
            map.entry(phase, &plugins.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in plugin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Registers or replaces `descriptor.name` for `descriptor.phase`.
    pub fn register<F>(&mut self, descriptor: PluginDescriptor, factory: F)
    where
        F: Fn(PluginArgs) -> Result<Box<dyn Plugin>, PluginError> + Send + Sync + 'static,
    {
        self.phases.entry(descriptor.phase).or_default().insert(
            descriptor.name.clone(),
            RegisteredPlugin {
                descriptor,
                factory: Arc::new(factory),
            },
        );
    }

    pub fn lookup(&self, phase: Phase, name: &str) -> Option<&PluginFactory> {
        self.phases
            .get(&phase)
            .and_then(|plugins| plugins.get(name))
            .map(|p| &p.factory)
    }

    pub fn descriptor(&self, phase: Phase, name: &str) -> Option<&PluginDescriptor> {
        self.phases
            .get(&phase)
            .and_then(|plugins| plugins.get(name))
            .map(|p| &p.descriptor)
    }

    pub fn all_names(&self, phase: Phase) -> BTreeSet<String> {
        self.phases
            .get(&phase)
            .map(|plugins| plugins.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `name` is registered for any phase.
    pub fn is_known(&self, name: &str) -> bool {
        self.phases.values().any(|plugins| plugins.contains_key(name))
    }

    pub fn descriptors(&self, phase: Phase) -> impl Iterator<Item = &PluginDescriptor> {
        self.phases
            .get(&phase)
            .into_iter()
            .flat_map(|plugins| plugins.values().map(|p| &p.descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_partitioned_by_phase() {
        let registry = PluginRegistry::with_builtins();
        let request = registry.all_names(Phase::Request);
        let response = registry.all_names(Phase::Response);

        assert!(request.contains("request_delay"));
        assert!(!request.contains("assert_http_status_code"));
        assert!(response.contains("assert_http_status_code"));
        assert!(request.contains("profiler") && response.contains("profiler"));
        assert!(registry.lookup(Phase::Response, "request_delay").is_none());
        assert!(registry.is_known("request_delay"));
        assert!(!registry.is_known("does_not_exist"));
    }

    #[test]
    fn signature_lists_defaults() {
        let registry = PluginRegistry::with_builtins();
        let descriptor = registry
            .descriptor(Phase::Response, "json_file_output")
            .unwrap();
        assert_eq!(descriptor.signature(), "json_file_output(filename, create_dirs=true)");
    }
}
