use serde_json::{Map, Value};

/// A `{plugin: name, ...arguments}` entry of a step or sequence plugin list.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PluginInvocation {
    /// Plugin name; may itself be a template.
    pub plugin: String,

    #[serde(flatten, default)]
    pub arguments: Map<String, Value>,
}

impl PluginInvocation {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(key.into(), value);
        self
    }
}
