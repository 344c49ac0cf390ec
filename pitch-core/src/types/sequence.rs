use serde_json::{Map, Value};

use crate::types::{Extensions, PluginInvocation, Step};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sequence {
    #[serde(default)]
    pub base_url: String,

    /// Request defaults applied to every step before the step's own fields.
    #[serde(default)]
    pub requests: Map<String, Value>,

    /// Initial variable namespace of every run.
    #[serde(default)]
    pub variables: Map<String, Value>,

    #[serde(default)]
    pub steps: Vec<Step>,

    /// Plugins prepended to every step's plugin list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginInvocation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failfast: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default_plugins: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<usize>,

    #[serde(flatten, default)]
    pub extensions: Extensions,
}

impl Sequence {
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or(1).max(1)
    }

    pub fn repeat(&self) -> usize {
        self.repeat.unwrap_or(1).max(1)
    }

    pub fn processes(&self) -> usize {
        self.processes.unwrap_or(1).max(1)
    }
}
